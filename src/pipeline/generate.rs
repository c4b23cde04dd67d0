//! Generation stage: resume + job description → tailored document sources.
//!
//! [`GenerationClient`] is the seam between the orchestrator and the network.
//! [`crate::pipeline::http::HttpBackend`] is the production implementation;
//! tests substitute fakes.

use crate::error::RemoteError;
use crate::pipeline::input::UploadCandidate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structured output of one generation call. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Typeset source of the tailored resume.
    pub optimized_resume_source: String,
    /// Typeset source of the cover letter.
    pub optimized_cover_letter_source: String,
    /// Improvement suggestions, in service order.
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send one multipart request with the resume and the job description.
    async fn generate(
        &self,
        file: &UploadCandidate,
        job_description: &str,
    ) -> Result<GenerationResult, RemoteError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

/// Success body of `POST /generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: GeneratedDocuments,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocuments {
    pub optimized_resume: String,
    pub optimized_cover_letter: String,
    #[serde(default)]
    pub resume_suggestions: Vec<String>,
}

impl From<GenerateResponse> for GenerationResult {
    fn from(resp: GenerateResponse) -> Self {
        let docs = resp.result;
        Self {
            optimized_resume_source: docs.optimized_resume,
            optimized_cover_letter_source: docs.optimized_cover_letter,
            suggestions: docs.resume_suggestions,
        }
    }
}

/// Error body shared by every endpoint of the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub raw_output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_body() {
        let body = r#"{"result":{"optimized_resume":"\\documentclass{article}","optimized_cover_letter":"Dear team","resume_suggestions":["Add Kubernetes experience","Lead with impact"]}}"#;
        let resp: GenerateResponse = serde_json::from_str(body).unwrap();
        let result = GenerationResult::from(resp);
        assert_eq!(result.optimized_resume_source, "\\documentclass{article}");
        assert_eq!(
            result.suggestions,
            vec!["Add Kubernetes experience", "Lead with impact"]
        );
    }

    #[test]
    fn missing_suggestions_default_to_empty() {
        let body = r#"{"result":{"optimized_resume":"a","optimized_cover_letter":"b"}}"#;
        let resp: GenerateResponse = serde_json::from_str(body).unwrap();
        assert!(GenerationResult::from(resp).suggestions.is_empty());
    }

    #[test]
    fn error_body_fields_are_optional() {
        let body: ErrorBody = serde_json::from_str(r#"{"error":"OpenAI API error"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("OpenAI API error"));
        assert!(body.details.is_none());
        assert!(body.raw_output.is_none());
    }
}
