use std::pin::Pin;

use futures::Stream;

use crate::error::Error;

pub mod dummy;
pub mod gemini;

/// One text fragment of a streamed completion, in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionChunk {
    pub text: String,
}

/// A finite, non-restartable sequence of completion fragments. A second
/// logical call must issue a new upstream request.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionChunk, Error>> + Send>>;

pub trait CompletionProvider {
    /// Submit `prompt` and stream back the generated fragments as the
    /// provider makes them available.
    async fn stream_completion(
        &self,
        prompt: &str,
        client: &reqwest::Client,
    ) -> Result<CompletionStream, Error>;
}
