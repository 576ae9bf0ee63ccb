use crate::error::{Error, ErrorDetails};
use crate::providers::{CompletionChunk, CompletionProvider, CompletionStream};

pub const PROVIDER_TYPE: &str = "dummy";

/// A deterministic provider for tests and local development. Behavior is
/// keyed off the model name:
///
/// - `"echo"` yields a single chunk containing the exact prompt received
/// - `"error"` fails before producing a stream
/// - `"error_in_stream"` yields one chunk and then an error
/// - anything else yields the fixed chunks in `DUMMY_STREAM_CHUNKS`
#[derive(Debug, Default)]
pub struct DummyProvider {
    model_name: String,
}

pub const DUMMY_STREAM_CHUNKS: &[&str] = &["Hi", " there"];

impl DummyProvider {
    pub fn new(model_name: String) -> Self {
        DummyProvider { model_name }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn error(&self) -> Error {
        Error::new(ErrorDetails::InferenceClient {
            message: format!("Dummy error for model `{}`", self.model_name),
            status_code: None,
            provider_type: PROVIDER_TYPE.to_string(),
            raw_response: None,
        })
    }
}

impl CompletionProvider for DummyProvider {
    async fn stream_completion(
        &self,
        prompt: &str,
        _client: &reqwest::Client,
    ) -> Result<CompletionStream, Error> {
        match self.model_name.as_str() {
            "error" => Err(self.error()),
            "echo" => Ok(Box::pin(tokio_stream::once(Ok::<_, Error>(
                CompletionChunk {
                    text: prompt.to_string(),
                },
            )))),
            "error_in_stream" => Ok(Box::pin(tokio_stream::iter(vec![
                Ok(CompletionChunk {
                    text: "Hi".to_string(),
                }),
                Err(self.error()),
            ]))),
            _ => Ok(Box::pin(tokio_stream::iter(
                DUMMY_STREAM_CHUNKS
                    .iter()
                    .map(|chunk| {
                        Ok(CompletionChunk {
                            text: (*chunk).to_string(),
                        })
                    })
                    .collect::<Vec<Result<CompletionChunk, Error>>>(),
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::http::build_client;

    #[tokio::test]
    async fn test_default_model_streams_fixed_chunks() {
        let provider = DummyProvider::new("good".to_string());
        let client = build_client().unwrap();
        let stream = provider.stream_completion("hello", &client).await.unwrap();
        let chunks: Vec<_> = stream.map(|chunk| chunk.unwrap().text).collect().await;
        assert_eq!(chunks, vec!["Hi".to_string(), " there".to_string()]);
    }

    #[tokio::test]
    async fn test_echo_model_returns_prompt() {
        let provider = DummyProvider::new("echo".to_string());
        let client = build_client().unwrap();
        let stream = provider
            .stream_completion("repeat after me", &client)
            .await
            .unwrap();
        let chunks: Vec<_> = stream.map(|chunk| chunk.unwrap().text).collect().await;
        assert_eq!(chunks, vec!["repeat after me".to_string()]);
    }

    #[tokio::test]
    async fn test_error_model_fails_immediately() {
        let provider = DummyProvider::new("error".to_string());
        let client = build_client().unwrap();
        let error = provider
            .stream_completion("hello", &client)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            error.get_details(),
            ErrorDetails::InferenceClient { .. }
        ));
    }

    #[tokio::test]
    async fn test_error_in_stream_model() {
        let provider = DummyProvider::new("error_in_stream".to_string());
        let client = build_client().unwrap();
        let stream = provider.stream_completion("hello", &client).await.unwrap();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
