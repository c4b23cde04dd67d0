//! Input validation: the resume upload and the job description field.
//!
//! Validators are pure functions of their input. [`InputForm`] stores the
//! latest value of each field and derives submittability from them on every
//! call, so readiness can never drift from the inputs it describes.

use crate::config::JobDescriptionPolicy;
use crate::error::{TailorError, ValidationError};
use bytes::Bytes;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// MIME type every upload must carry.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Largest accepted upload: 10 MiB. Exactly this size is still valid.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// A file the user selected as their resume.
///
/// Replaced wholesale on every selection; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    name: String,
    mime_type: String,
    /// Size of the file on disk; equals `bytes.len()` unless the file was
    /// too large to load.
    size_bytes: u64,
    bytes: Bytes,
}

impl UploadCandidate {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            bytes,
        }
    }

    /// Read a resume from disk.
    ///
    /// The MIME type is sniffed from the `%PDF` magic bytes rather than
    /// trusted from the extension; anything else is reported as
    /// `application/octet-stream` and will fail [`validate_upload`].
    ///
    /// A file larger than [`MAX_UPLOAD_BYTES`] is not loaded: the candidate
    /// carries its real size and no content, so it fails validation with
    /// the size message.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TailorError> {
        let path = path.as_ref();
        let io_error = |e: std::io::Error| match e.kind() {
            std::io::ErrorKind::NotFound => TailorError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => TailorError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => TailorError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            },
        };
        let name = file_name_of(path);

        let size_bytes = tokio::fs::metadata(path).await.map_err(io_error)?.len();
        if size_bytes > MAX_UPLOAD_BYTES {
            let mut head = Vec::with_capacity(PDF_MAGIC.len());
            tokio::fs::File::open(path)
                .await
                .map_err(io_error)?
                .take(PDF_MAGIC.len() as u64)
                .read_to_end(&mut head)
                .await
                .map_err(io_error)?;
            let mime_type = sniff_mime_type(&head);
            debug!("Skipped loading {} ({} bytes, over the limit)", name, size_bytes);
            return Ok(Self {
                name,
                mime_type: mime_type.to_string(),
                size_bytes,
                bytes: Bytes::new(),
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(io_error)?;
        let mime_type = sniff_mime_type(&bytes);
        debug!("Loaded {} ({} bytes, {})", name, bytes.len(), mime_type);

        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

const PDF_MAGIC: &[u8] = b"%PDF";

fn sniff_mime_type(head: &[u8]) -> &'static str {
    if head.starts_with(PDF_MAGIC) {
        PDF_MIME_TYPE
    } else {
        "application/octet-stream"
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("resume.pdf")
        .to_string()
}

/// Outcome of validating one input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// No upload selected. Not an error, but not submittable either.
    Cleared,
    Invalid(ValidationError),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    /// Inline message to show beside the field, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            Validation::Invalid(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

/// Validate a resume upload.
///
/// Checks run in order and the first failure wins: absent → `Cleared`,
/// wrong MIME type → "Upload a PDF file", larger than
/// [`MAX_UPLOAD_BYTES`] → "File size must be less than 10MB".
pub fn validate_upload(candidate: Option<&UploadCandidate>) -> Validation {
    let Some(candidate) = candidate else {
        return Validation::Cleared;
    };

    if candidate.mime_type() != PDF_MIME_TYPE {
        return Validation::Invalid(ValidationError::NotAPdf {
            mime_type: candidate.mime_type().to_string(),
        });
    }

    if candidate.size_bytes() > MAX_UPLOAD_BYTES {
        return Validation::Invalid(ValidationError::TooLarge {
            size_bytes: candidate.size_bytes(),
            max_bytes: MAX_UPLOAD_BYTES,
        });
    }

    Validation::Valid
}

/// Validate the job description under the deployment's policy.
///
/// Under [`JobDescriptionPolicy::Url`] an empty field is `Valid` (nothing
/// typed yet); use [`is_submittable_job_description`] for the stricter
/// check applied before a submission.
pub fn validate_job_description(policy: JobDescriptionPolicy, text: &str) -> Validation {
    match policy {
        JobDescriptionPolicy::FreeText => {
            if text.trim().is_empty() {
                Validation::Invalid(ValidationError::EmptyJobDescription)
            } else {
                Validation::Valid
            }
        }
        JobDescriptionPolicy::Url => {
            if text.is_empty() {
                return Validation::Valid;
            }
            match parse_job_url(text) {
                Ok(()) => Validation::Valid,
                Err(reason) => Validation::Invalid(ValidationError::InvalidJobUrl { reason }),
            }
        }
    }
}

/// A job description is submittable when it validates and is not blank.
pub fn is_submittable_job_description(policy: JobDescriptionPolicy, text: &str) -> bool {
    !text.trim().is_empty() && validate_job_description(policy, text).is_valid()
}

/// An absolute URL with a host, e.g. `https://example.com/jobs/1`.
fn parse_job_url(text: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(text).map_err(|e| e.to_string())?;
    if !url.has_host() {
        return Err(format!("'{}' URL has no host", url.scheme()));
    }
    Ok(())
}

/// The current value of both input fields.
#[derive(Debug, Clone, Default)]
pub struct InputForm {
    file: Option<UploadCandidate>,
    job_description: String,
}

impl InputForm {
    /// Replace the selected file and return its validation.
    ///
    /// An invalid selection is not kept: like a file picker that rejects the
    /// choice, the field ends up empty.
    pub fn select_file(&mut self, candidate: Option<UploadCandidate>) -> Validation {
        let validation = validate_upload(candidate.as_ref());
        self.file = match validation {
            Validation::Valid => candidate,
            _ => None,
        };
        validation
    }

    pub fn set_job_description(&mut self, policy: JobDescriptionPolicy, text: impl Into<String>) -> Validation {
        self.job_description = text.into();
        validate_job_description(policy, &self.job_description)
    }

    pub fn file(&self) -> Option<&UploadCandidate> {
        self.file.as_ref()
    }

    pub fn job_description(&self) -> &str {
        &self.job_description
    }

    /// Both fields valid and the job description non-blank.
    pub fn can_submit(&self, policy: JobDescriptionPolicy) -> bool {
        validate_upload(self.file.as_ref()).is_valid()
            && is_submittable_job_description(policy, &self.job_description)
    }
}
