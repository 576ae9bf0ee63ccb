use futures::StreamExt;
use reqwest::StatusCode;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DisplayOrDebug, Error, ErrorDetails};
use crate::model::{Credential, CredentialLocation};
use crate::providers::{CompletionChunk, CompletionProvider, CompletionStream};

const PROVIDER_NAME: &str = "Google AI Studio Gemini";
pub const PROVIDER_TYPE: &str = "google_ai_studio_gemini";

pub fn default_api_key_location() -> CredentialLocation {
    CredentialLocation::Env("GEMINI_API_KEY".to_string())
}

/// Implements a subset of the Google AI Studio Gemini API as documented
/// [here](https://ai.google.dev/gemini-api/docs/text-generation?lang=rest):
/// single-turn text prompts with streamed (SSE) responses.
#[derive(Debug)]
pub struct GeminiProvider {
    model_name: String,
    streaming_request_url: Url,
    credentials: GeminiCredentials,
}

impl GeminiProvider {
    pub fn new(model_name: String, credential: Credential) -> Result<Self, Error> {
        let streaming_request_url = Url::parse(&format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model_name}:streamGenerateContent?alt=sse",
        ))
        .map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse streaming request URL: {e}"),
            })
        })?;
        Ok(GeminiProvider {
            model_name,
            streaming_request_url,
            credentials: credential.try_into()?,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[derive(Debug)]
pub struct GeminiCredentials {
    api_key: SecretString,
}

impl TryFrom<Credential> for GeminiCredentials {
    type Error = Error;

    fn try_from(credential: Credential) -> Result<Self, Error> {
        match credential {
            Credential::Static(api_key) => Ok(GeminiCredentials { api_key }),
            Credential::None => Err(Error::new(ErrorDetails::ApiKeyMissing {
                provider_name: PROVIDER_NAME.to_string(),
                message: "No credentials are configured".to_string(),
            })),
        }
    }
}

impl CompletionProvider for GeminiProvider {
    async fn stream_completion(
        &self,
        prompt: &str,
        client: &reqwest::Client,
    ) -> Result<CompletionStream, Error> {
        let request_body = serde_json::to_value(GeminiRequest::new(prompt)).map_err(|e| {
            Error::new(ErrorDetails::Serialization {
                message: format!(
                    "Error serializing Gemini request: {}",
                    DisplayOrDebug::new(e)
                ),
            })
        })?;
        let mut url = self.streaming_request_url.clone();
        url.query_pairs_mut()
            .append_pair("key", self.credentials.api_key.expose_secret());
        let event_source = client.post(url).json(&request_body).eventsource().map_err(|e| {
            Error::new(ErrorDetails::InferenceClient {
                message: format!("Error building event stream request: {e}"),
                status_code: None,
                provider_type: PROVIDER_TYPE.to_string(),
                raw_response: None,
            })
        })?;
        Ok(stream_gemini(event_source))
    }
}

fn stream_gemini(mut event_source: EventSource) -> CompletionStream {
    Box::pin(async_stream::stream! {
        while let Some(ev) = event_source.next().await {
            match ev {
                Err(e) => {
                    if matches!(e, reqwest_eventsource::Error::StreamEnded) {
                        break;
                    }
                    // A broken stream is not recoverable; bail out instead of
                    // letting the event source attempt a reconnect (which
                    // would re-issue the generation request).
                    yield Err(convert_stream_error(e).await);
                    event_source.close();
                    break;
                }
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => {
                    let data: Result<GeminiResponse, Error> =
                        serde_json::from_str(&message.data).map_err(|e| {
                            Error::new(ErrorDetails::InferenceServer {
                                message: format!(
                                    "Error parsing streaming JSON response: {}",
                                    DisplayOrDebug::new(e)
                                ),
                                provider_type: PROVIDER_TYPE.to_string(),
                                raw_response: Some(message.data.clone()),
                            })
                        });
                    match data {
                        Ok(data) => yield Ok(gemini_response_to_chunk(data)),
                        Err(e) => yield Err(e),
                    }
                }
            }
        }
    })
}

async fn convert_stream_error(e: reqwest_eventsource::Error) -> Error {
    match e {
        reqwest_eventsource::Error::InvalidStatusCode(status_code, response) => {
            let response_body = response.text().await.unwrap_or_default();
            handle_gemini_error(status_code, response_body)
        }
        reqwest_eventsource::Error::InvalidContentType(_, response) => {
            let raw_response = response.text().await.ok();
            Error::new(ErrorDetails::InferenceServer {
                message: "Unexpected content type for event stream".to_string(),
                provider_type: PROVIDER_TYPE.to_string(),
                raw_response,
            })
        }
        _ => Error::new(ErrorDetails::InferenceServer {
            message: e.to_string(),
            provider_type: PROVIDER_TYPE.to_string(),
            raw_response: None,
        }),
    }
}

fn handle_gemini_error(status_code: StatusCode, response_body: String) -> Error {
    match status_code {
        StatusCode::UNAUTHORIZED
        | StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::TOO_MANY_REQUESTS => Error::new(ErrorDetails::InferenceClient {
            status_code: Some(status_code),
            message: response_body.clone(),
            raw_response: Some(response_body),
            provider_type: PROVIDER_TYPE.to_string(),
        }),
        // NOT_FOUND, FORBIDDEN, INTERNAL_SERVER_ERROR, 529: Overloaded
        // all have the same error behavior
        _ => Error::new(ErrorDetails::InferenceServer {
            message: response_body.clone(),
            raw_response: Some(response_body),
            provider_type: PROVIDER_TYPE.to_string(),
        }),
    }
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum GeminiRole {
    User,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: GeminiRole,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

impl<'a> GeminiRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: GeminiRole::User,
                parts: vec![GeminiPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiResponseCandidate>,
}

/// Concatenates the text parts of the first candidate of one streamed event.
fn gemini_response_to_chunk(response: GeminiResponse) -> CompletionChunk {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();
    CompletionChunk { text }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_request_serialization() {
        let request = GeminiRequest::new("What is the capital of Japan?");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [{"text": "What is the capital of Japan?"}],
                }],
            })
        );
    }

    #[test]
    fn test_gemini_response_to_chunk() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{"text": "Tokyo"}, {"text": " is the capital."}]
                    }
                }],
                "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 5}
            }"#,
        )
        .unwrap();
        let chunk = gemini_response_to_chunk(response);
        assert_eq!(chunk.text, "Tokyo is the capital.");
    }

    #[test]
    fn test_gemini_response_without_content() {
        let response: GeminiResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "STOP"}]}"#).unwrap();
        let chunk = gemini_response_to_chunk(response);
        assert_eq!(chunk.text, "");
    }

    #[test]
    fn test_handle_gemini_error() {
        let error = handle_gemini_error(StatusCode::TOO_MANY_REQUESTS, "quota".to_string());
        match error.get_details() {
            ErrorDetails::InferenceClient { status_code, .. } => {
                assert_eq!(*status_code, Some(StatusCode::TOO_MANY_REQUESTS));
            }
            details => unreachable!("unexpected error details: {details:?}"),
        }

        let error = handle_gemini_error(StatusCode::INTERNAL_SERVER_ERROR, "oops".to_string());
        assert!(matches!(
            error.get_details(),
            ErrorDetails::InferenceServer { .. }
        ));
    }

    #[test]
    fn test_provider_construction() {
        let provider = GeminiProvider::new(
            "gemini-2.0-flash-exp".to_string(),
            Credential::Static(SecretString::from("test-api-key")),
        )
        .unwrap();
        assert_eq!(provider.model_name(), "gemini-2.0-flash-exp");

        let error = GeminiProvider::new("gemini-2.0-flash-exp".to_string(), Credential::None)
            .unwrap_err();
        assert!(matches!(
            error.get_details(),
            ErrorDetails::ApiKeyMissing { .. }
        ));
    }
}
