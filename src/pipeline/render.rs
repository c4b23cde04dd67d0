//! Render stage: document source → PDF bytes.
//!
//! Called once per generated document. The service compiles the source
//! (LaTeX in the reference deployment) and answers with the PDF itself.

use crate::error::ConversionError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

/// First bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

#[async_trait]
pub trait ArtifactConverter: Send + Sync {
    /// Send one request with `source` and return the rendered document.
    async fn convert(&self, source: &str) -> Result<Bytes, ConversionError>;
}

/// Body of `POST /convert-latex-to-pdf`.
#[derive(Debug, Serialize)]
pub struct ConvertRequest<'a> {
    pub latex_content: &'a str,
}

/// Reject bodies that are not PDFs before they get a handle.
pub fn check_pdf_magic(bytes: &Bytes) -> Result<(), ConversionError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(ConversionError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}
