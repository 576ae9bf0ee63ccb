use std::fmt::{Debug, Display};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tokio::sync::OnceCell;

/// Controls whether to include raw upstream response details in error output.
///
/// When true, provider error messages carry the raw response body, which may
/// expose sensitive request/response data in logs.
static DEBUG: OnceCell<bool> = OnceCell::const_new();

pub fn set_debug(debug: bool) -> Result<(), Error> {
    DEBUG.set(debug).map_err(|_| {
        Error::new(ErrorDetails::Config {
            message: "Failed to set debug mode".to_string(),
        })
    })
}

fn debug_enabled() -> bool {
    *DEBUG.get().unwrap_or(&false)
}

/// Chooses between a `Debug` or `Display` representation based on the
/// gateway-level `DEBUG` flag.
pub struct DisplayOrDebug<T: Debug + Display> {
    val: T,
}

impl<T: Debug + Display> DisplayOrDebug<T> {
    pub fn new(val: T) -> Self {
        Self { val }
    }
}

impl<T: Debug + Display> Display for DisplayOrDebug<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if debug_enabled() {
            write!(f, "{:?}", self.val)
        } else {
            write!(f, "{}", self.val)
        }
    }
}

#[derive(Debug, PartialEq)]
// As long as the struct member is private, we force people to use the `new`
// method and log the error. `ErrorDetails` is boxed per `clippy::result_large_err`.
pub struct Error(Box<ErrorDetails>);

impl Error {
    #[must_use]
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Box::new(details))
    }

    #[must_use]
    pub fn new_without_logging(details: ErrorDetails) -> Self {
        Error(Box::new(details))
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    #[must_use]
    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    pub fn log(&self) {
        self.0.log();
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

#[derive(Debug, PartialEq)]
pub enum ErrorDetails {
    ApiKeyMissing {
        provider_name: String,
        message: String,
    },
    AppState {
        message: String,
    },
    Config {
        message: String,
    },
    InferenceClient {
        message: String,
        status_code: Option<StatusCode>,
        provider_type: String,
        raw_response: Option<String>,
    },
    InferenceServer {
        message: String,
        provider_type: String,
        raw_response: Option<String>,
    },
    InternalError {
        message: String,
    },
    JsonRequest {
        message: String,
    },
    PdfExtraction {
        message: String,
    },
    RouteNotFound {
        path: String,
        method: String,
    },
    Serialization {
        message: String,
    },
}

impl ErrorDetails {
    /// Defines the error level for logging this error
    fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::ApiKeyMissing { .. }
            | ErrorDetails::AppState { .. }
            | ErrorDetails::Config { .. }
            | ErrorDetails::InferenceClient { .. }
            | ErrorDetails::InferenceServer { .. }
            | ErrorDetails::InternalError { .. }
            | ErrorDetails::Serialization { .. } => tracing::Level::ERROR,
            ErrorDetails::JsonRequest { .. } | ErrorDetails::PdfExtraction { .. } => {
                tracing::Level::WARN
            }
            ErrorDetails::RouteNotFound { .. } => tracing::Level::DEBUG,
        }
    }

    /// Defines the HTTP status code for responses involving this error
    fn status_code(&self) -> StatusCode {
        match self {
            ErrorDetails::ApiKeyMissing { .. }
            | ErrorDetails::AppState { .. }
            | ErrorDetails::Config { .. }
            | ErrorDetails::InternalError { .. }
            | ErrorDetails::Serialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorDetails::InferenceClient { status_code, .. } => {
                status_code.unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ErrorDetails::InferenceServer { .. } => StatusCode::BAD_GATEWAY,
            ErrorDetails::JsonRequest { .. } | ErrorDetails::PdfExtraction { .. } => {
                StatusCode::BAD_REQUEST
            }
            ErrorDetails::RouteNotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Log the error using the `tracing` library
    pub fn log(&self) {
        match self.level() {
            tracing::Level::ERROR => tracing::error!("{self}"),
            tracing::Level::WARN => tracing::warn!("{self}"),
            tracing::Level::INFO => tracing::info!("{self}"),
            tracing::Level::DEBUG => tracing::debug!("{self}"),
            tracing::Level::TRACE => tracing::trace!("{self}"),
        }
    }
}

impl Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::ApiKeyMissing {
                provider_name,
                message,
            } => {
                write!(f, "API key missing for provider {provider_name}: {message}")
            }
            ErrorDetails::AppState { message } => {
                write!(f, "Error initializing AppState: {message}")
            }
            ErrorDetails::Config { message } => write!(f, "{message}"),
            ErrorDetails::InferenceClient {
                message,
                status_code,
                provider_type,
                raw_response,
            } => {
                write!(
                    f,
                    "Error from {provider_type} client{}: {message}",
                    status_code
                        .map(|s| format!(" (status {s})"))
                        .unwrap_or_default()
                )?;
                if debug_enabled() {
                    if let Some(raw_response) = raw_response {
                        write!(f, ": {raw_response}")?;
                    }
                }
                Ok(())
            }
            ErrorDetails::InferenceServer {
                message,
                provider_type,
                raw_response,
            } => {
                write!(f, "Error from {provider_type} server: {message}")?;
                if debug_enabled() {
                    if let Some(raw_response) = raw_response {
                        write!(f, ": {raw_response}")?;
                    }
                }
                Ok(())
            }
            ErrorDetails::InternalError { message } => write!(f, "Internal error: {message}"),
            ErrorDetails::JsonRequest { message } => write!(f, "{message}"),
            ErrorDetails::PdfExtraction { message } => write!(f, "{message}"),
            ErrorDetails::RouteNotFound { path, method } => {
                write!(f, "Route not found: {method} {path}")
            }
            ErrorDetails::Serialization { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    /// Log the error and convert it into an Axum response
    fn into_response(self) -> Response {
        let body = json!({"error": self.to_string()});
        (self.status_code(), Json(body)).into_response()
    }
}
