use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{Error, ErrorDetails};
use crate::http::build_client;
use crate::model::CompletionModel;

/// State for the API
#[derive(Clone)]
pub struct AppStateData {
    pub config: Arc<Config>,
    pub http_client: reqwest::Client,
    pub model: Arc<CompletionModel>,
}
pub type AppState = axum::extract::State<AppStateData>;

impl AppStateData {
    /// Builds the shared state from a loaded config. Fails if the configured
    /// provider credential cannot be resolved, so a misconfigured process
    /// never starts serving traffic.
    pub fn new(config: Arc<Config>) -> Result<Self, Error> {
        let model = Arc::new(CompletionModel::new(&config.model)?);
        let http_client = build_client()?;
        Ok(Self {
            config,
            http_client,
            model,
        })
    }
}

/// Custom Axum extractor that validates the JSON body and deserializes it
/// into a custom type.
///
/// When this extractor is present, we don't check if the `Content-Type`
/// header is `application/json`, and instead simply assume that the request
/// body is a JSON object.
pub struct StructuredJson<T>(pub T);

impl<S, T> FromRequest<S> for StructuredJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: Send + Sync + DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // Retrieve the request body as Bytes before deserializing it
        let bytes = bytes::Bytes::from_request(req, state)
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::JsonRequest {
                    message: format!("{e} ({})", e.status()),
                })
            })?;

        // Convert the entire body into `serde_json::Value`
        let value = Json::<serde_json::Value>::from_bytes(&bytes)
            .map_err(|e| {
                Error::new(ErrorDetails::JsonRequest {
                    message: format!("{e} ({})", e.status()),
                })
            })?
            .0;

        // Now use `serde_path_to_error::deserialize` to attempt deserialization into `T`
        let deserialized: T = serde_path_to_error::deserialize(&value).map_err(|e| {
            Error::new(ErrorDetails::JsonRequest {
                message: e.to_string(),
            })
        })?;

        Ok(StructuredJson(deserialized))
    }
}
