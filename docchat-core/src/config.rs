use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::http::HeaderValue;
use serde::Deserialize;

use crate::error::{Error, ErrorDetails};
use crate::model::CredentialLocation;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Config, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to read config file `{}`: {e}", path.display()),
            })
        })?;
        Self::load_from_toml(&contents)
    }

    pub fn load_from_toml(contents: &str) -> Result<Config, Error> {
        toml::from_str(contents).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse config file: {e}"),
            })
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub bind_address: Option<SocketAddr>,
    /// If set, all of the HTTP endpoints will have this path prepended.
    pub base_path: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "provider")]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum ModelConfig {
    #[serde(rename = "google_ai_studio_gemini")]
    GoogleAIStudioGemini {
        #[serde(default = "default_gemini_model_name")]
        model_name: String,
        api_key_location: Option<CredentialLocation>,
    },
    Dummy { model_name: String },
}

fn default_gemini_model_name() -> String {
    "gemini-2.0-flash-exp".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::GoogleAIStudioGemini {
            model_name: default_gemini_model_name(),
            api_key_location: None,
        }
    }
}

/// CORS configuration for the browser front-end.
///
/// If no origins are configured, defaults to the localhost origins used in
/// development.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_cors_max_age_seconds")]
    pub max_age_seconds: u64,
    #[serde(default = "default_cors_allow_credentials")]
    pub allow_credentials: bool,
}

fn default_cors_max_age_seconds() -> u64 {
    3600
}

fn default_cors_allow_credentials() -> bool {
    true
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: default_cors_max_age_seconds(),
            allow_credentials: default_cors_allow_credentials(),
        }
    }
}

const LOCALHOST_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:3001"];

impl CorsConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Converts configured origins to a `HeaderValue` list, falling back to
    /// the localhost origins when none are configured. Unparseable origins
    /// are skipped with a warning.
    pub fn to_header_values(&self) -> Vec<HeaderValue> {
        if self.allowed_origins.is_empty() {
            LOCALHOST_ORIGINS
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect()
        } else {
            self.allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("Skipping invalid CORS origin `{origin}`: {e}");
                        None
                    }
                })
                .collect()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Extracted document text is truncated to this many characters.
    #[serde(default = "default_max_extract_chars")]
    pub max_chars: usize,
    /// Request bodies (including uploads) beyond this size are rejected.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_extract_chars() -> usize {
    5000
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_extract_chars(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}
