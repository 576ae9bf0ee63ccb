use std::time::Duration;

use reqwest::Client;

use crate::error::{Error, ErrorDetails};

// This is set high enough that it should never be hit for a normal model
// response, including a long streamed generation.
pub const DEFAULT_HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub fn build_client() -> Result<Client, Error> {
    Client::builder()
        .timeout(DEFAULT_HTTP_CLIENT_TIMEOUT)
        .build()
        .map_err(|e| {
            Error::new(ErrorDetails::AppState {
                message: format!("Failed to build HTTP client: {e}"),
            })
        })
}
