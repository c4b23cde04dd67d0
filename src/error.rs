//! Error types for the resume-tailor library.
//!
//! Four error types reflect four distinct failure surfaces:
//!
//! * [`TailorError`]: **Fatal**: the pipeline cannot be built or a local
//!   I/O step failed (bad configuration, unreadable resume file, output
//!   directory not writable). Returned as `Err(TailorError)`.
//!
//! * [`ValidationError`]: **Local**: an input field is not acceptable.
//!   Never leaves the input layer; surfaced as an inline field message.
//!
//! * [`RemoteError`]: the generation call failed.
//!
//! * [`ConversionError`]: converting one generated document into a PDF
//!   failed.
//!
//! Remote and conversion failures never propagate as `Err` out of
//! [`crate::Pipeline::submit`]; they end the submission in the
//! [`crate::PipelineState::Failed`] state with an [`crate::ErrorInfo`].

use std::path::PathBuf;
use thiserror::Error;

/// Fallback message when the generation service gives no usable error body.
pub const GENERIC_GENERATION_ERROR: &str = "Failed to generate documents";

/// Fallback message when the conversion service gives no usable error body.
pub const GENERIC_CONVERSION_ERROR: &str = "Failed to convert LaTeX to PDF";

/// All fatal errors returned by the resume-tailor library.
#[derive(Debug, Error)]
pub enum TailorError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Resume file was not found at the given path.
    #[error("Resume file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// The handle was already released (or never issued by this pipeline).
    #[error("Artifact handle {handle} is no longer live")]
    ArtifactReleased { handle: String },

    /// Could not create or write an output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// An input field failed validation.
///
/// The `Display` text is the exact message shown next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The selected file is not a PDF.
    #[error("Upload a PDF file")]
    NotAPdf { mime_type: String },

    /// The selected file exceeds the upload limit.
    #[error("File size must be less than 10MB")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    /// Free-text policy: nothing but whitespace was entered.
    #[error("Enter a job description")]
    EmptyJobDescription,

    /// URL policy: the text is not an absolute URL.
    #[error("Enter a valid job posting URL")]
    InvalidJobUrl { reason: String },
}

/// The generation call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never produced a response (DNS, connect, reset, …).
    #[error("Could not reach the generation service: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("Generation request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with a non-success status.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        details: Option<String>,
        raw_output: Option<String>,
    },

    /// A success status whose body did not match the expected shape.
    #[error("Generation service returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// Converting one generated document to a PDF failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The request never produced a response.
    #[error("Could not reach the conversion service: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("Conversion request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with a non-success status.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        details: Option<String>,
    },

    /// The body was received but is not a PDF.
    #[error("Conversion service returned a non-PDF body (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The body could not be read.
    #[error("Conversion service returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// Compose the user-facing message from a structured error body.
///
/// `error` wins when present and non-blank; `details` is appended after a
/// colon. Without a usable `error` field the `fallback` is returned.
pub(crate) fn compose_message(error: Option<&str>, details: Option<&str>, fallback: &str) -> String {
    let base = match error.map(str::trim) {
        Some(e) if !e.is_empty() => e,
        _ => fallback,
    };
    match details.map(str::trim) {
        Some(d) if !d.is_empty() => format!("{base}: {d}"),
        _ => base.to_string(),
    }
}
