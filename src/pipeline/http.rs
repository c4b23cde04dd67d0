//! HTTP implementation of the generation and render stages.
//!
//! One [`HttpBackend`] talks to one service instance:
//!
//! | Call | Request | Success body |
//! |------|---------|--------------|
//! | health | `GET /` | `{status, message}` |
//! | generate | `POST /generate`, multipart `resume_pdf` + `jobDescription` | `{result: {…}}` |
//! | convert | `POST /convert-latex-to-pdf`, JSON `{latex_content}` | PDF bytes |
//!
//! Every failure answer carries `{error, details?, raw_output?}`; the
//! message shown to the user is built from it, falling back to a generic
//! message when the body is missing or not JSON. Nothing is retried.

use crate::config::PipelineConfig;
use crate::error::{
    compose_message, ConversionError, RemoteError, TailorError, GENERIC_CONVERSION_ERROR,
    GENERIC_GENERATION_ERROR,
};
use crate::pipeline::generate::{ErrorBody, GenerateResponse, GenerationClient, GenerationResult};
use crate::pipeline::input::UploadCandidate;
use crate::pipeline::render::{check_pdf_magic, ArtifactConverter, ConvertRequest};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Answer of the service's health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Upper bound on a health check, whatever the generation timeout is.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed client for the generation service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    generate_timeout: Option<Duration>,
    convert_timeout: Option<Duration>,
    health_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &PipelineConfig) -> Result<Self, TailorError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| TailorError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            generate_timeout: config.generate_timeout(),
            convert_timeout: config.convert_timeout(),
            health_timeout: HEALTH_TIMEOUT,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Ask the service whether it is up.
    pub async fn health(&self) -> Result<HealthStatus, RemoteError> {
        let url = self.endpoint("/");
        let timeout = Some(self.health_timeout);
        let response = send(self.client.get(&url), timeout)
            .await
            .map_err(|e| remote_transport_error(e, timeout))?;

        if !response.status().is_success() {
            return Err(remote_status_error(response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl GenerationClient for HttpBackend {
    async fn generate(
        &self,
        file: &UploadCandidate,
        job_description: &str,
    ) -> Result<GenerationResult, RemoteError> {
        let url = self.endpoint("/generate");
        info!("POST {} ({}, {} bytes)", url, file.name(), file.size_bytes());

        let part = Part::stream(file.bytes().clone())
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())
            .map_err(|e| RemoteError::Transport(format!("invalid MIME type: {e}")))?;
        let form = Form::new()
            .part("resume_pdf", part)
            .text("jobDescription", job_description.to_string());

        let response = send(self.client.post(&url).multipart(form), self.generate_timeout)
            .await
            .map_err(|e| remote_transport_error(e, self.generate_timeout))?;

        if !response.status().is_success() {
            let err = remote_status_error(response).await;
            warn!("Generation failed: {}", err);
            return Err(err);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        let parsed: GenerateResponse =
            serde_json::from_slice(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        debug!(
            "Generation returned {} + {} source bytes, {} suggestions",
            parsed.result.optimized_resume.len(),
            parsed.result.optimized_cover_letter.len(),
            parsed.result.resume_suggestions.len()
        );

        Ok(parsed.into())
    }
}

#[async_trait]
impl ArtifactConverter for HttpBackend {
    async fn convert(&self, source: &str) -> Result<Bytes, ConversionError> {
        let url = self.endpoint("/convert-latex-to-pdf");
        debug!("POST {} ({} source bytes)", url, source.len());

        let request = self.client.post(&url).json(&ConvertRequest {
            latex_content: source,
        });
        let response = send(request, self.convert_timeout)
            .await
            .map_err(|e| conversion_transport_error(e, self.convert_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let (status, body) = read_error_body(response).await;
            let err = ConversionError::Status {
                status,
                message: compose_message(
                    body.error.as_deref(),
                    body.details.as_deref(),
                    GENERIC_CONVERSION_ERROR,
                ),
                details: body.details,
            };
            warn!("Conversion failed: {}", err);
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConversionError::InvalidResponse(e.to_string()))?;
        check_pdf_magic(&bytes)?;
        Ok(bytes)
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn send(request: RequestBuilder, timeout: Option<Duration>) -> reqwest::Result<Response> {
    let request = match timeout {
        Some(t) => request.timeout(t),
        None => request,
    };
    request.send().await
}

/// Drain a failure response into its status and best-effort error body.
async fn read_error_body(response: Response) -> (u16, ErrorBody) {
    let status = response.status().as_u16();
    let body = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorBody>(&bytes).unwrap_or_else(|e| {
            debug!("HTTP {} body is not a JSON error body: {}", status, e);
            ErrorBody::default()
        }),
        Err(e) => {
            debug!("HTTP {} body unreadable: {}", status, e);
            ErrorBody::default()
        }
    };
    (status, body)
}

async fn remote_status_error(response: Response) -> RemoteError {
    let (status, body) = read_error_body(response).await;
    RemoteError::Status {
        status,
        message: compose_message(
            body.error.as_deref(),
            body.details.as_deref(),
            GENERIC_GENERATION_ERROR,
        ),
        details: body.details,
        raw_output: body.raw_output,
    }
}

fn remote_transport_error(err: reqwest::Error, timeout: Option<Duration>) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout {
            secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
        }
    } else {
        RemoteError::Transport(err.to_string())
    }
}

fn conversion_transport_error(err: reqwest::Error, timeout: Option<Duration>) -> ConversionError {
    if err.is_timeout() {
        ConversionError::Timeout {
            secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
        }
    } else {
        ConversionError::Transport(err.to_string())
    }
}
