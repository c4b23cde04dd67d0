//! # resume-tailor
//!
//! Tailor a resume and a cover letter to a job description, using a remote
//! generation service that returns typeset sources and a conversion service
//! that turns each source into a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! resume.pdf + job description
//!  │
//!  ├─ 1. Input     validate the upload (PDF, ≤ 10 MiB) and the description
//!  ├─ 2. Generate  POST /generate → resume source, cover letter source, suggestions
//!  ├─ 3. Render    POST /convert-latex-to-pdf, once per document
//!  ├─ 4. Install   give each PDF a handle, retire the previous pair
//!  └─ 5. Output    downloadable artifacts + suggestions
//! ```
//!
//! A [`Pipeline`] runs at most one submission at a time and publishes its
//! [`PipelineState`] through a watch channel. Converted PDFs live in a
//! resource table and are referenced by [`ArtifactHandle`]; a handle stays
//! live until the pair it belongs to is replaced, a submission fails, or the
//! pipeline is torn down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_tailor::{Pipeline, PipelineConfig, PipelineState, UploadCandidate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::with_http(PipelineConfig::default())?;
//!     let resume = UploadCandidate::from_path("resume.pdf").await?;
//!
//!     pipeline.submit(Some(&resume), "Senior backend engineer").await;
//!
//!     match pipeline.state() {
//!         PipelineState::Ready(pair) => {
//!             let saved = resume_tailor::save_artifacts(&pipeline, &pair, "out").await?;
//!             println!("{}", saved.resume.display());
//!             for s in &pair.suggestions {
//!                 println!("- {s}");
//!             }
//!         }
//!         PipelineState::Failed { error, .. } => eprintln!("{error}"),
//!         _ => {}
//!     }
//!     pipeline.teardown();
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tailor` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume-tailor = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod resources;
pub mod state;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionMode, JobDescriptionPolicy, PipelineConfig, PipelineConfigBuilder, DEFAULT_API_BASE_URL,
};
pub use error::{ConversionError, RemoteError, TailorError, ValidationError};
pub use orchestrator::Pipeline;
pub use output::{save_artifacts, SavedArtifacts};
pub use pipeline::generate::{GenerationClient, GenerationResult};
pub use pipeline::http::{HealthStatus, HttpBackend};
pub use pipeline::input::{
    validate_job_description, validate_upload, InputForm, UploadCandidate, Validation,
    MAX_UPLOAD_BYTES, PDF_MIME_TYPE,
};
pub use pipeline::render::ArtifactConverter;
pub use progress::{NoopObserver, ObserverHandle, PipelineObserver};
pub use resources::{ArtifactHandle, ResourceTable};
pub use state::{
    Artifact, ArtifactPair, DocumentKind, ErrorInfo, FailureStage, PipelineState, Rejection,
    SubmitOutcome,
};
pub use stream::PipelineStateStream;
