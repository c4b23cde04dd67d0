//! The values the pipeline publishes to its presentation layer.
//!
//! [`PipelineState`] is the single source of truth a renderer reads. It is
//! cheap to clone: artifacts are referenced by [`ArtifactHandle`], the bytes
//! stay in the pipeline's resource table.

use crate::error::{ConversionError, RemoteError};
use crate::resources::ArtifactHandle;
use serde::Serialize;
use std::fmt;

/// Which of the two generated documents an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Resume => f.write_str("resume"),
            DocumentKind::CoverLetter => f.write_str("cover letter"),
        }
    }
}

/// One converted document, owned by the pipeline's resource table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: DocumentKind,
    pub handle: ArtifactHandle,
    /// Name offered when the artifact is downloaded.
    pub file_name: String,
    pub size_bytes: usize,
}

/// The result of one successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPair {
    /// Id of the submission that produced this pair.
    pub request_id: u64,
    pub resume: Artifact,
    pub cover_letter: Artifact,
    /// Suggestions in the order the generation service returned them.
    pub suggestions: Vec<String>,
}

impl ArtifactPair {
    pub fn handles(&self) -> [ArtifactHandle; 2] {
        [self.resume.handle, self.cover_letter.handle]
    }

    pub fn artifact(&self, kind: DocumentKind) -> &Artifact {
        match kind {
            DocumentKind::Resume => &self.resume,
            DocumentKind::CoverLetter => &self.cover_letter,
        }
    }
}

/// Where a submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Generation,
    Conversion(DocumentKind),
}

/// Payload of [`PipelineState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub stage: FailureStage,
    /// Human-readable message for the user.
    pub message: String,
    /// Extra detail from the service's error body, if any.
    pub details: Option<String>,
    /// Unparsed model output the service attached to the error, if any.
    pub raw_output: Option<String>,
    /// HTTP status, when the service answered at all.
    pub status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            details: None,
            raw_output: None,
            status: None,
        }
    }

    pub fn from_remote(err: &RemoteError) -> Self {
        let mut info = Self::new(FailureStage::Generation, err.to_string());
        if let RemoteError::Status {
            status,
            details,
            raw_output,
            ..
        } = err
        {
            info.status = Some(*status);
            info.details = details.clone();
            info.raw_output = raw_output.clone();
        }
        info
    }

    pub fn from_conversion(kind: DocumentKind, err: &ConversionError) -> Self {
        let mut info = Self::new(FailureStage::Conversion(kind), err.to_string());
        if let ConversionError::Status {
            status, details, ..
        } = err
        {
            info.status = Some(*status);
            info.details = details.clone();
        }
        info
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The pipeline's published state. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing submitted yet (or the pipeline was torn down).
    #[default]
    Idle,
    /// A submission is in flight.
    Submitting {
        request_id: u64,
        /// The pair on display before this submission began, still downloadable.
        previous: Option<ArtifactPair>,
    },
    /// The latest submission succeeded.
    Ready(ArtifactPair),
    /// The latest submission failed.
    Failed {
        request_id: u64,
        error: ErrorInfo,
        /// The last ready pair, if one is still on display.
        previous: Option<ArtifactPair>,
    },
}

impl PipelineState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, PipelineState::Submitting { .. })
    }

    /// The pair a renderer should offer for download, if any.
    ///
    /// During `Submitting` and after `Failed` this is the previous pair.
    pub fn artifacts(&self) -> Option<&ArtifactPair> {
        match self {
            PipelineState::Idle => None,
            PipelineState::Ready(pair) => Some(pair),
            PipelineState::Submitting { previous, .. } | PipelineState::Failed { previous, .. } => {
                previous.as_ref()
            }
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            PipelineState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Why a call to [`crate::Pipeline::submit`] did not start a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No file has been selected.
    MissingFile,
    /// The selected file fails validation.
    InvalidFile(crate::error::ValidationError),
    /// The job description is empty.
    EmptyJobDescription,
    /// The job description fails validation.
    InvalidJobDescription(crate::error::ValidationError),
    /// Another submission is already in flight.
    Busy,
    /// The pipeline was torn down.
    TornDown,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingFile => f.write_str("Select a resume PDF first"),
            Rejection::InvalidFile(e) | Rejection::InvalidJobDescription(e) => write!(f, "{e}"),
            Rejection::EmptyJobDescription => f.write_str("Enter a job description"),
            Rejection::Busy => f.write_str("A submission is already in progress"),
            Rejection::TornDown => f.write_str("The pipeline has been shut down"),
        }
    }
}

/// What a call to [`crate::Pipeline::submit`] amounted to.
///
/// Callers that only render [`PipelineState`] can ignore this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The guard refused the call; nothing changed and no request was sent.
    Rejected(Rejection),
    /// The submission ran and the state is now `Ready`.
    Ready { request_id: u64 },
    /// The submission ran and the state is now `Failed`.
    Failed { request_id: u64 },
    /// The submission resolved after it stopped being current; nothing was applied.
    Discarded { request_id: u64 },
}
