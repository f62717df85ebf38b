//! PDF text extraction behind the `pdf-extract` crate.
//!
//! Extraction is CPU-bound and must run inside `tokio::task::spawn_blocking`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{0}")]
    Pdf(String),

    #[error("the PDF contains no extractable text")]
    Empty,
}

/// Extracts the full text of a PDF, pages joined in document order.
///
/// Scanned or image-only PDFs yield [`ExtractError::Empty`] rather than an
/// empty string, so callers never send a blank resume to the model.
pub async fn pdf_text(bytes: bytes::Bytes) -> Result<String, ExtractError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractError::Pdf(format!("extraction task failed: {e}")))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}
