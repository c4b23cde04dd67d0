//! Pipeline stages for resume tailoring.
//!
//! Each submodule implements one step. The two remote steps are traits so the
//! orchestrator never touches the network directly.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ generate ──▶ render (×2)
//! (validate)  (sources)    (PDF bytes)
//!              └──── http ────┘
//! ```
//!
//! 1. [`input`]: validate the resume upload and the job description
//! 2. [`generate`]: [`generate::GenerationClient`] turns resume + description into
//!    two document sources and a list of suggestions
//! 3. [`render`]: [`render::ArtifactConverter`] turns one document source into a PDF
//! 4. [`http`]: the reqwest implementation of both traits

pub mod generate;
pub mod http;
pub mod input;
pub mod render;
