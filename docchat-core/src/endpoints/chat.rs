use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::Error;
use crate::providers::CompletionStream;
use crate::utils::gateway::{AppState, AppStateData, StructuredJson};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// A handler for a plain chat turn. The message is submitted to the model
/// verbatim (empty strings included) and the generated fragments are relayed
/// back in arrival order.
pub async fn chat_handler(
    State(state): AppState,
    StructuredJson(params): StructuredJson<ChatRequest>,
) -> Response {
    relay_completion(&state, &params.message).await
}

/// Streams the completion for `prompt` as a chunked `text/plain` response.
///
/// Upstream failures never surface as transport errors here: both a failed
/// initial request and a mid-stream error are folded into the body as a
/// single marker fragment, and the response completes with a success status.
pub(crate) async fn relay_completion(state: &AppStateData, prompt: &str) -> Response {
    let stream = match state
        .model
        .stream_completion(prompt, &state.http_client)
        .await
    {
        Ok(stream) => stream,
        Err(e) => return plain_text_response(Body::from(error_fragment(&e))),
    };
    plain_text_response(Body::from_stream(forward_fragments(stream)))
}

fn plain_text_response(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

fn error_fragment(error: &Error) -> String {
    format!("❌ Error: {error}")
}

/// Forwards fragments to the caller as they arrive, in upstream order. The
/// first error terminates the stream after one marker fragment.
fn forward_fragments(
    mut stream: CompletionStream,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => yield Ok(Bytes::from(chunk.text)),
                Err(e) => {
                    yield Ok(Bytes::from(error_fragment(&e)));
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::routing::post;

    use super::*;
    use crate::testing::{dummy_app_state, spawn_router};

    fn chat_router(model_name: &str) -> Router {
        Router::new()
            .route("/chat", post(chat_handler))
            .with_state(dummy_app_state(model_name))
    }

    #[tokio::test]
    async fn test_chat_streams_fragments_in_order() {
        let addr = spawn_router(chat_router("good")).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&serde_json::json!({"message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(response.text().await.unwrap(), "Hi there");
    }

    #[tokio::test]
    async fn test_chat_passes_message_through_verbatim() {
        let addr = spawn_router(chat_router("echo")).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&serde_json::json!({"message": "  spaces and\nnewlines  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "  spaces and\nnewlines  ");
    }

    #[tokio::test]
    async fn test_chat_allows_empty_message() {
        let addr = spawn_router(chat_router("echo")).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&serde_json::json!({"message": ""}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_chat_upstream_failure_is_in_band() {
        let addr = spawn_router(chat_router("error")).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&serde_json::json!({"message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body = response.text().await.unwrap();
        assert!(body.starts_with("❌ Error:"), "unexpected body: {body}");
    }

    #[tokio::test]
    async fn test_chat_mid_stream_failure_terminates_cleanly() {
        let addr = spawn_router(chat_router("error_in_stream")).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&serde_json::json!({"message": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body = response.text().await.unwrap();
        assert!(body.starts_with("Hi"), "unexpected body: {body}");
        assert!(body.contains("❌ Error:"), "unexpected body: {body}");
    }

    #[tokio::test]
    async fn test_chat_malformed_body_is_rejected() {
        let addr = spawn_router(chat_router("good")).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&serde_json::json!({"msg": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body.get("error").is_some());
    }
}
