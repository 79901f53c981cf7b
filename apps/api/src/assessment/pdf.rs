//! PDF text extraction for uploaded job descriptions and CVs.
//!
//! Parsing is CPU-bound, so it runs via `tokio::task::spawn_blocking`.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("file is not a PDF")]
    NotPdf,

    #[error("could not read PDF: {0}")]
    Unreadable(String),

    #[error("PDF contains no extractable text")]
    NoText,

    #[error("PDF extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// Extracts and cleans the text of a PDF held in memory.
pub async fn extract_text(data: Bytes) -> Result<String, PdfError> {
    if !is_pdf(&data) {
        return Err(PdfError::NotPdf);
    }
    let size = data.len();
    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await?
        .map_err(|e| PdfError::Unreadable(e.to_string()))?;

    let text = clean_text(&raw);
    if text.is_empty() {
        return Err(PdfError::NoText);
    }
    debug!("Extracted {} chars from {size}-byte PDF", text.len());
    Ok(text)
}

/// Trims every line and drops blank ones.
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
