use crate::error::{Error, ErrorDetails};

/// Extracts the plain text of an uploaded PDF, in document order, truncated
/// to at most `max_chars` characters.
///
/// Extraction runs entirely in memory on the blocking pool: there is no
/// shared staging file, so concurrent uploads cannot observe each other.
pub async fn extract_pdf_text(bytes: Vec<u8>, max_chars: usize) -> Result<String, Error> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| {
            Error::new(ErrorDetails::InternalError {
                message: format!("PDF extraction task failed: {e}"),
            })
        })?
        .map_err(|e| {
            Error::new(ErrorDetails::PdfExtraction {
                message: e.to_string(),
            })
        })?;
    Ok(truncate_chars(text, max_chars))
}

/// Hard truncation to at most `max_chars` characters. Counts characters, not
/// bytes, so multi-byte text is never split mid-character. Information beyond
/// the limit is silently dropped; no truncation marker is added.
pub fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}
