use axum::Json;
use axum::extract::{Multipart, State};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorDetails};
use crate::extract::extract_pdf_text;
use crate::utils::gateway::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct ExtractedTextResponse {
    pub text: String,
}

/// A handler for PDF uploads. Returns the extracted text, truncated to the
/// configured character limit.
///
/// Failures are reported in the same `{text}` shape as success, with a
/// marker prefix embedded in the text, so callers always get a 200 response
/// with the same body shape.
pub async fn upload_pdf_handler(
    State(state): AppState,
    multipart: Multipart,
) -> Json<ExtractedTextResponse> {
    let text = match upload_to_text(multipart, state.config.extraction.max_chars).await {
        Ok(text) => text,
        Err(e) => format!("❌ Failed to read PDF: {e}"),
    };
    Json(ExtractedTextResponse { text })
}

async fn upload_to_text(mut multipart: Multipart, max_chars: usize) -> Result<String, Error> {
    let bytes = read_uploaded_file(&mut multipart).await?;
    extract_pdf_text(bytes, max_chars).await
}

/// Reads the bytes of the `file` field (or the first field carrying a
/// filename) of a multipart upload. No content-type validation: any bytes
/// are accepted and handed to extraction, which reports its own failures.
async fn read_uploaded_file(multipart: &mut Multipart) -> Result<Vec<u8>, Error> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::new(ErrorDetails::PdfExtraction {
            message: format!("Error reading multipart upload: {e}"),
        })
    })? {
        if field.name() == Some("file") || field.file_name().is_some() {
            let bytes = field.bytes().await.map_err(|e| {
                Error::new(ErrorDetails::PdfExtraction {
                    message: format!("Error reading uploaded file: {e}"),
                })
            })?;
            return Ok(bytes.to_vec());
        }
    }
    Err(Error::new(ErrorDetails::PdfExtraction {
        message: "Missing `file` field in multipart upload".to_string(),
    }))
}
