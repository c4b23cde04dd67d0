//! Configuration types for the tailoring pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Input policy, conversion dispatch, service
//! location and timeouts all live in one struct so a deployment decides them
//! once and every pipeline instance it creates behaves the same way.

use crate::error::TailorError;
use crate::progress::PipelineObserver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Base URL used when none is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";

/// Configuration for a tailoring pipeline.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use resume_tailor::{ConversionMode, JobDescriptionPolicy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .api_base_url("http://localhost:5000")
///     .job_description_policy(JobDescriptionPolicy::Url)
///     .conversion_mode(ConversionMode::Sequential)
///     .build()
///     .unwrap();
/// assert_eq!(config.job_description_policy, JobDescriptionPolicy::Url);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Base URL of the generation service. Default: `http://127.0.0.1:5000`.
    ///
    /// `/generate` and `/convert-latex-to-pdf` are resolved against it.
    pub api_base_url: String,

    /// How the job description field is validated. Default: [`JobDescriptionPolicy::FreeText`].
    pub job_description_policy: JobDescriptionPolicy,

    /// Whether the two conversions run one after the other or together.
    /// Default: [`ConversionMode::Concurrent`].
    pub conversion_mode: ConversionMode,

    /// Timeout for the generation request in seconds. `None` waits forever.
    /// Default: 180.
    ///
    /// Generation runs a language model over the whole resume, so it is by far
    /// the slowest call.
    pub generate_timeout_secs: Option<u64>,

    /// Timeout for each conversion request in seconds. `None` waits forever.
    /// Default: 60.
    pub convert_timeout_secs: Option<u64>,

    /// TCP connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// File name offered for the resume download. Default: `optimized-resume.pdf`.
    pub resume_file_name: String,

    /// File name offered for the cover letter download. Default: `cover-letter.pdf`.
    pub cover_letter_file_name: String,

    /// Receives lifecycle events. Default: none.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            job_description_policy: JobDescriptionPolicy::default(),
            conversion_mode: ConversionMode::default(),
            generate_timeout_secs: Some(180),
            convert_timeout_secs: Some(60),
            connect_timeout_secs: 10,
            resume_file_name: "optimized-resume.pdf".to_string(),
            cover_letter_file_name: "cover-letter.pdf".to_string(),
            observer: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_base_url", &self.api_base_url)
            .field("job_description_policy", &self.job_description_policy)
            .field("conversion_mode", &self.conversion_mode)
            .field("generate_timeout_secs", &self.generate_timeout_secs)
            .field("convert_timeout_secs", &self.convert_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("resume_file_name", &self.resume_file_name)
            .field("cover_letter_file_name", &self.cover_letter_file_name)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// `api_base_url` without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn generate_timeout(&self) -> Option<Duration> {
        self.generate_timeout_secs.map(Duration::from_secs)
    }

    pub fn convert_timeout(&self) -> Option<Duration> {
        self.convert_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn job_description_policy(mut self, policy: JobDescriptionPolicy) -> Self {
        self.config.job_description_policy = policy;
        self
    }

    pub fn conversion_mode(mut self, mode: ConversionMode) -> Self {
        self.config.conversion_mode = mode;
        self
    }

    pub fn generate_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.generate_timeout_secs = secs;
        self
    }

    pub fn convert_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.convert_timeout_secs = secs;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn resume_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.resume_file_name = name.into();
        self
    }

    pub fn cover_letter_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.cover_letter_file_name = name.into();
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, TailorError> {
        let c = &self.config;

        let parsed = reqwest::Url::parse(&c.api_base_url).map_err(|e| {
            TailorError::InvalidConfig(format!("api_base_url '{}': {e}", c.api_base_url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TailorError::InvalidConfig(format!(
                "api_base_url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if c.generate_timeout_secs == Some(0) || c.convert_timeout_secs == Some(0) {
            return Err(TailorError::InvalidConfig(
                "Request timeouts must be ≥ 1s (use None to disable)".into(),
            ));
        }
        if c.connect_timeout_secs == 0 {
            return Err(TailorError::InvalidConfig(
                "Connect timeout must be ≥ 1s".into(),
            ));
        }

        for name in [&c.resume_file_name, &c.cover_letter_file_name] {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(TailorError::InvalidConfig(format!(
                    "Artifact file name must be a bare, non-empty name, got '{name}'"
                )));
            }
        }
        if c.resume_file_name == c.cover_letter_file_name {
            return Err(TailorError::InvalidConfig(
                "Resume and cover letter file names must differ".into(),
            ));
        }

        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the job description field is interpreted and validated.
///
/// | Policy | Valid when |
/// |--------|------------|
/// | `FreeText` | trimmed text is non-empty |
/// | `Url` | text is empty (not yet submittable) or an absolute URL with a host |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobDescriptionPolicy {
    /// The user pastes the job description itself. (default)
    #[default]
    FreeText,
    /// The user pastes a link to the job posting.
    Url,
}

/// Dispatch order of the two document conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversionMode {
    /// Resume first; the cover letter is only converted if the resume succeeded.
    Sequential,
    /// Both requests in flight at once; both outcomes are awaited before
    /// deciding. (default)
    #[default]
    Concurrent,
}
