use secrecy::SecretString;
use serde::Deserialize;

use crate::config::ModelConfig;
use crate::error::{Error, ErrorDetails};
use crate::providers::dummy::DummyProvider;
use crate::providers::gemini::{self, GeminiProvider};
use crate::providers::{CompletionProvider, CompletionStream};

/// Where to find a provider credential at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialLocation {
    /// Environment variable containing the actual credential
    Env(String),
    None,
}

impl<'de> Deserialize<'de> for CredentialLocation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if let Some(inner) = s.strip_prefix("env::") {
            Ok(CredentialLocation::Env(inner.to_string()))
        } else if s == "none" {
            Ok(CredentialLocation::None)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid api_key_location format: {s}"
            )))
        }
    }
}

#[derive(Debug)]
pub enum Credential {
    Static(SecretString),
    None,
}

/// Resolves a credential location once, at startup. A missing or empty
/// environment variable is an error so that a misconfigured process fails
/// before serving traffic.
pub fn load_credential(
    location: &CredentialLocation,
    provider_name: &str,
) -> Result<Credential, Error> {
    match location {
        CredentialLocation::Env(var) => match std::env::var(var) {
            Ok(value) if !value.is_empty() => Ok(Credential::Static(SecretString::from(value))),
            _ => Err(Error::new(ErrorDetails::ApiKeyMissing {
                provider_name: provider_name.to_string(),
                message: format!("Environment variable `{var}` is not set"),
            })),
        },
        CredentialLocation::None => Ok(Credential::None),
    }
}

#[derive(Debug)]
pub enum ProviderConfig {
    GoogleAIStudioGemini(GeminiProvider),
    Dummy(DummyProvider),
}

/// The process-wide handle to the configured completion provider.
#[derive(Debug)]
pub struct CompletionModel {
    provider: ProviderConfig,
}

impl CompletionModel {
    pub fn new(config: &ModelConfig) -> Result<Self, Error> {
        let provider = match config {
            ModelConfig::GoogleAIStudioGemini {
                model_name,
                api_key_location,
            } => {
                let location = api_key_location
                    .clone()
                    .unwrap_or_else(gemini::default_api_key_location);
                let credential = load_credential(&location, "Google AI Studio Gemini")?;
                ProviderConfig::GoogleAIStudioGemini(GeminiProvider::new(
                    model_name.clone(),
                    credential,
                )?)
            }
            ModelConfig::Dummy { model_name } => {
                ProviderConfig::Dummy(DummyProvider::new(model_name.clone()))
            }
        };
        Ok(CompletionModel { provider })
    }

    pub fn provider_type(&self) -> &'static str {
        match &self.provider {
            ProviderConfig::GoogleAIStudioGemini(_) => gemini::PROVIDER_TYPE,
            ProviderConfig::Dummy(_) => crate::providers::dummy::PROVIDER_TYPE,
        }
    }

    pub fn model_name(&self) -> &str {
        match &self.provider {
            ProviderConfig::GoogleAIStudioGemini(provider) => provider.model_name(),
            ProviderConfig::Dummy(provider) => provider.model_name(),
        }
    }

    pub async fn stream_completion(
        &self,
        prompt: &str,
        client: &reqwest::Client,
    ) -> Result<CompletionStream, Error> {
        match &self.provider {
            ProviderConfig::GoogleAIStudioGemini(provider) => {
                provider.stream_completion(prompt, client).await
            }
            ProviderConfig::Dummy(provider) => provider.stream_completion(prompt, client).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct LocationHolder {
        location: CredentialLocation,
    }

    #[test]
    fn test_credential_location_deserialization() {
        let holder: LocationHolder =
            serde_json::from_str(r#"{"location": "env::GEMINI_API_KEY"}"#).unwrap();
        assert_eq!(
            holder.location,
            CredentialLocation::Env("GEMINI_API_KEY".to_string())
        );

        let holder: LocationHolder = serde_json::from_str(r#"{"location": "none"}"#).unwrap();
        assert_eq!(holder.location, CredentialLocation::None);

        let error =
            serde_json::from_str::<LocationHolder>(r#"{"location": "path::/tmp/key"}"#)
                .unwrap_err();
        assert!(error.to_string().contains("Invalid api_key_location"));
    }

    #[test]
    fn test_load_credential_missing_env_var() {
        let location = CredentialLocation::Env("DOCCHAT_TEST_UNSET_API_KEY".to_string());
        let error = load_credential(&location, "Google AI Studio Gemini").unwrap_err();
        assert!(matches!(
            error.get_details(),
            ErrorDetails::ApiKeyMissing { .. }
        ));
    }

    #[test]
    fn test_dummy_model_construction() {
        let model = CompletionModel::new(&ModelConfig::Dummy {
            model_name: "echo".to_string(),
        })
        .unwrap();
        assert_eq!(model.provider_type(), "dummy");
        assert_eq!(model.model_name(), "echo");
    }
}
