use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::endpoints::chat::relay_completion;
use crate::utils::gateway::{AppState, StructuredJson};

#[derive(Debug, Deserialize)]
pub struct PdfQuestionRequest {
    pub message: String,
    pub context: String,
}

/// Builds the combined prompt for a question about previously extracted
/// document text: the context appears first, verbatim, followed by the
/// question, verbatim.
pub(crate) fn compose_document_prompt(context: &str, message: &str) -> String {
    format!(
        "You are reading the following document:\n\n{context}\n\nBased on this, answer the question:\n{message}"
    )
}

/// A handler for questions grounded in previously extracted document text.
/// The context is caller-supplied and trusted as-is; nothing is re-derived
/// from a prior upload server-side.
pub async fn ask_pdf_handler(
    State(state): AppState,
    StructuredJson(params): StructuredJson<PdfQuestionRequest>,
) -> Response {
    let prompt = compose_document_prompt(&params.context, &params.message);
    relay_completion(&state, &prompt).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::routing::post;

    use super::*;
    use crate::testing::{dummy_app_state, spawn_router};

    #[test]
    fn test_compose_document_prompt_ordering() {
        let prompt = compose_document_prompt("This is a recipe.", "What is this?");
        let context_idx = prompt.find("This is a recipe.").unwrap();
        let message_idx = prompt.find("What is this?").unwrap();
        assert!(context_idx < message_idx);
    }

    #[tokio::test]
    async fn test_ask_pdf_composes_context_and_question() {
        let router = Router::new()
            .route("/ask-pdf", post(ask_pdf_handler))
            .with_state(dummy_app_state("echo"));
        let addr = spawn_router(router).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/ask-pdf"))
            .json(&serde_json::json!({
                "message": "What is this?",
                "context": "This is a recipe.",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let echoed_prompt = response.text().await.unwrap();
        let context_idx = echoed_prompt.find("This is a recipe.").unwrap();
        let message_idx = echoed_prompt.find("What is this?").unwrap();
        assert!(context_idx < message_idx);
    }

    #[tokio::test]
    async fn test_ask_pdf_upstream_failure_is_in_band() {
        let router = Router::new()
            .route("/ask-pdf", post(ask_pdf_handler))
            .with_state(dummy_app_state("error"));
        let addr = spawn_router(router).await;
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/ask-pdf"))
            .json(&serde_json::json!({"message": "hi", "context": "doc"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().starts_with("❌ Error:"));
    }
}
