//! The tailoring pipeline: a single submission state machine.
//!
//! ```text
//!            submit (guard ok)
//!   Idle ──────────────────────▶ Submitting ──▶ Ready(pair)
//!    ▲                             │   ▲            │
//!    │ teardown                    ▼   └────────────┤ submit
//!    └──────────────────────── Failed(error) ◀──────┘
//! ```
//!
//! [`Pipeline::submit`] runs the whole sequence on the caller's task:
//! guard → generate → convert both documents → install the pair. The
//! internal lock is only ever taken between suspension points, never across
//! an `.await`, and a submission that arrives while another is in flight is
//! rejected. Each submission gets a request id; when it resolves after it
//! stopped being current (the pipeline was torn down meanwhile) its result is
//! dropped and every handle it created is released.
//!
//! Dropping the `submit` future part way (an outer timeout, `select!`, an
//! aborted task) abandons the submission: its handles are released and the
//! state it replaced is published again.

use crate::config::{ConversionMode, PipelineConfig};
use crate::error::TailorError;
use crate::pipeline::generate::GenerationClient;
use crate::pipeline::http::HttpBackend;
use crate::pipeline::input::{
    validate_job_description, validate_upload, InputForm, UploadCandidate, Validation, PDF_MIME_TYPE,
};
use crate::pipeline::render::ArtifactConverter;
use crate::progress::PipelineObserver;
use crate::resources::{ArtifactHandle, ResourceTable};
use crate::state::{
    Artifact, ArtifactPair, DocumentKind, ErrorInfo, PipelineState, Rejection, SubmitOutcome,
};
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Handle to one pipeline instance.
///
/// Clones share the instance. Its resources are released by
/// [`Pipeline::teardown`] or when the last clone is dropped.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

struct Inner {
    config: PipelineConfig,
    generator: Arc<dyn GenerationClient>,
    converter: Arc<dyn ArtifactConverter>,
    state_tx: watch::Sender<PipelineState>,
    book: Mutex<Book>,
}

/// Everything mutable, behind one lock.
#[derive(Default)]
struct Book {
    last_request_id: u64,
    in_flight: Option<u64>,
    /// The pair currently on display; its handles are live.
    current: Option<ArtifactPair>,
    /// Handles created by a submission that has not settled yet.
    pending: Vec<(u64, ArtifactHandle)>,
    resources: ResourceTable,
    form: InputForm,
    torn_down: bool,
}

impl Book {
    fn is_current(&self, request_id: u64) -> bool {
        !self.torn_down && self.in_flight == Some(request_id)
    }

    /// Forget the pending handles of `request_id` and return them.
    fn take_pending(&mut self, request_id: u64) -> Vec<ArtifactHandle> {
        let mut taken = Vec::new();
        self.pending.retain(|&(id, handle)| {
            if id == request_id {
                taken.push(handle);
                false
            } else {
                true
            }
        });
        taken
    }

    fn release_into(&mut self, handles: impl IntoIterator<Item = ArtifactHandle>, released: &mut Vec<ArtifactHandle>) {
        for handle in handles {
            if self.resources.release(handle) {
                released.push(handle);
            }
        }
    }
}

/// Undoes an admitted submission whose future is dropped before it settles.
struct InFlight<'a> {
    pipeline: &'a Pipeline,
    request_id: u64,
    /// The state `Submitting` replaced.
    prior: Option<PipelineState>,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let prior = self.prior.take().unwrap_or_default();
            self.pipeline.abandon(self.request_id, prior);
        }
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn GenerationClient>,
        converter: Arc<dyn ArtifactConverter>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Self {
            inner: Arc::new(Inner {
                config,
                generator,
                converter,
                state_tx,
                book: Mutex::new(Book::default()),
            }),
        }
    }

    /// Build a pipeline that talks to the service at `config.api_base_url`.
    pub fn with_http(config: PipelineConfig) -> Result<Self, TailorError> {
        let backend = Arc::new(HttpBackend::new(&config)?);
        Ok(Self::new(config, backend.clone(), backend))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    // ── Observable state ─────────────────────────────────────────────────

    /// Snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receiver that sees every state the pipeline publishes from now on.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.inner.state_tx.subscribe()
    }

    // ── Input form ───────────────────────────────────────────────────────

    /// Replace the selected resume; `None` clears the field.
    pub fn select_file(&self, candidate: Option<UploadCandidate>) -> Validation {
        self.book().form.select_file(candidate)
    }

    pub fn set_job_description(&self, text: impl Into<String>) -> Validation {
        let policy = self.inner.config.job_description_policy;
        self.book().form.set_job_description(policy, text)
    }

    /// Whether the stored inputs would pass the submission guard.
    pub fn can_submit(&self) -> bool {
        let policy = self.inner.config.job_description_policy;
        self.book().form.can_submit(policy)
    }

    /// Submit whatever the input form currently holds.
    pub async fn submit_current(&self) -> SubmitOutcome {
        let (file, job_description) = {
            let book = self.book();
            (
                book.form.file().cloned(),
                book.form.job_description().to_string(),
            )
        };
        self.submit(file.as_ref(), &job_description).await
    }

    // ── Submission ───────────────────────────────────────────────────────

    /// Run one submission to completion.
    ///
    /// The inputs are validated again here regardless of what the caller
    /// checked. A rejected call changes nothing and sends nothing.
    pub async fn submit(&self, file: Option<&UploadCandidate>, job_description: &str) -> SubmitOutcome {
        let (request_id, file, prior) = match self.admit(file, job_description) {
            Ok(admitted) => admitted,
            Err(rejection) => {
                debug!("Submission rejected: {:?}", rejection);
                return SubmitOutcome::Rejected(rejection);
            }
        };
        let mut guard = InFlight {
            pipeline: self,
            request_id,
            prior: Some(prior),
            settled: false,
        };

        let outcome = self.run(request_id, &file, job_description).await;
        guard.settled = true;
        outcome
    }

    async fn run(&self, request_id: u64, file: &UploadCandidate, job_description: &str) -> SubmitOutcome {
        info!(
            "Submission {} started ({}, {} bytes)",
            request_id,
            file.name(),
            file.size_bytes()
        );
        self.notify(|o| o.on_submission_start(request_id));

        // ── Step 1: Generate ─────────────────────────────────────────────
        let generated = match self.inner.generator.generate(file, job_description).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!("Submission {}: generation failed: {}", request_id, e);
                return self.fail(request_id, ErrorInfo::from_remote(&e));
            }
        };
        info!(
            "Submission {}: generation complete, {} suggestion(s)",
            request_id,
            generated.suggestions.len()
        );
        self.notify(|o| o.on_generation_complete(request_id, generated.suggestions.len()));

        if !self.book().is_current(request_id) {
            return self.discard(request_id);
        }

        // ── Step 2: Convert both documents ───────────────────────────────
        let resume_source = generated.optimized_resume_source.as_str();
        let cover_source = generated.optimized_cover_letter_source.as_str();

        let (resume, cover_letter) = match self.inner.config.conversion_mode {
            ConversionMode::Sequential => {
                let resume = match self.convert_document(request_id, DocumentKind::Resume, resume_source).await {
                    Ok(artifact) => artifact,
                    Err(error) => return self.fail(request_id, error),
                };
                match self
                    .convert_document(request_id, DocumentKind::CoverLetter, cover_source)
                    .await
                {
                    Ok(artifact) => (resume, artifact),
                    Err(error) => return self.fail(request_id, error),
                }
            }
            ConversionMode::Concurrent => {
                let (resume, cover_letter) = futures::join!(
                    self.convert_document(request_id, DocumentKind::Resume, resume_source),
                    self.convert_document(request_id, DocumentKind::CoverLetter, cover_source),
                );
                // Both outcomes are in; the resume's error wins when both failed.
                match (resume, cover_letter) {
                    (Ok(resume), Ok(cover_letter)) => (resume, cover_letter),
                    (Err(error), _) | (Ok(_), Err(error)) => return self.fail(request_id, error),
                }
            }
        };

        // ── Step 3: Install the pair ─────────────────────────────────────
        let pair = ArtifactPair {
            request_id,
            resume,
            cover_letter,
            suggestions: generated.suggestions,
        };
        self.finish(pair)
    }

    /// Entry guard. On success the state is already `Submitting` and the
    /// state it replaced is returned.
    fn admit(
        &self,
        file: Option<&UploadCandidate>,
        job_description: &str,
    ) -> Result<(u64, UploadCandidate, PipelineState), Rejection> {
        let file = file.ok_or(Rejection::MissingFile)?;
        if let Validation::Invalid(e) = validate_upload(Some(file)) {
            return Err(Rejection::InvalidFile(e));
        }
        if job_description.trim().is_empty() {
            return Err(Rejection::EmptyJobDescription);
        }
        if let Validation::Invalid(e) =
            validate_job_description(self.inner.config.job_description_policy, job_description)
        {
            return Err(Rejection::InvalidJobDescription(e));
        }

        let mut book = self.book();
        if book.torn_down {
            return Err(Rejection::TornDown);
        }
        if book.in_flight.is_some() {
            return Err(Rejection::Busy);
        }

        book.last_request_id += 1;
        let request_id = book.last_request_id;
        book.in_flight = Some(request_id);
        let prior = self.inner.state_tx.send_replace(PipelineState::Submitting {
            request_id,
            previous: book.current.clone(),
        });

        Ok((request_id, file.clone(), prior))
    }

    /// Convert one document and give its bytes a handle.
    ///
    /// The handle stays pending until the submission settles.
    async fn convert_document(
        &self,
        request_id: u64,
        kind: DocumentKind,
        source: &str,
    ) -> Result<Artifact, ErrorInfo> {
        let bytes = self.inner.converter.convert(source).await.map_err(|e| {
            warn!("Submission {}: {} conversion failed: {}", request_id, kind, e);
            ErrorInfo::from_conversion(kind, &e)
        })?;

        let size_bytes = bytes.len();
        let handle = {
            let mut book = self.book();
            let handle = book.resources.create_handle(bytes);
            book.pending.push((request_id, handle));
            handle
        };
        debug!(
            "Submission {}: {} converted ({} bytes) → {}",
            request_id, kind, size_bytes, handle
        );
        self.notify(|o| o.on_document_converted(request_id, kind, size_bytes));

        Ok(Artifact {
            kind,
            handle,
            file_name: self.file_name(kind).to_string(),
            size_bytes,
        })
    }

    fn finish(&self, pair: ArtifactPair) -> SubmitOutcome {
        let request_id = pair.request_id;
        let mut released = Vec::new();
        let applied = {
            let mut book = self.book();
            let pending = book.take_pending(request_id);
            if book.is_current(request_id) {
                // Retire the old pair before the new one becomes visible.
                if let Some(old) = book.current.take() {
                    book.release_into(old.handles(), &mut released);
                }
                book.current = Some(pair.clone());
                book.in_flight = None;
                self.inner.state_tx.send_replace(PipelineState::Ready(pair.clone()));
                true
            } else {
                book.release_into(pending, &mut released);
                false
            }
        };
        self.notify_released(&released);

        if applied {
            info!(
                "Submission {} ready: {} + {} bytes, {} suggestion(s)",
                request_id,
                pair.resume.size_bytes,
                pair.cover_letter.size_bytes,
                pair.suggestions.len()
            );
            self.notify(|o| o.on_ready(request_id));
            SubmitOutcome::Ready { request_id }
        } else {
            self.discarded(request_id)
        }
    }

    /// End a submission in `Failed`, releasing whatever it created.
    fn fail(&self, request_id: u64, error: ErrorInfo) -> SubmitOutcome {
        let mut released = Vec::new();
        let applied = {
            let mut book = self.book();
            let pending = book.take_pending(request_id);
            book.release_into(pending, &mut released);
            if book.is_current(request_id) {
                book.in_flight = None;
                self.inner.state_tx.send_replace(PipelineState::Failed {
                    request_id,
                    error: error.clone(),
                    previous: book.current.clone(),
                });
                true
            } else {
                false
            }
        };
        self.notify_released(&released);

        if applied {
            warn!("Submission {} failed: {}", request_id, error);
            self.notify(|o| o.on_failed(request_id, &error));
            SubmitOutcome::Failed { request_id }
        } else {
            self.discarded(request_id)
        }
    }

    fn discard(&self, request_id: u64) -> SubmitOutcome {
        let mut released = Vec::new();
        {
            let mut book = self.book();
            let pending = book.take_pending(request_id);
            book.release_into(pending, &mut released);
        }
        self.notify_released(&released);
        self.discarded(request_id)
    }

    fn discarded(&self, request_id: u64) -> SubmitOutcome {
        info!("Submission {} is stale; result discarded", request_id);
        self.notify(|o| o.on_discarded(request_id));
        SubmitOutcome::Discarded { request_id }
    }

    /// The `submit` future was dropped before the submission settled.
    fn abandon(&self, request_id: u64, prior: PipelineState) {
        let mut released = Vec::new();
        let restored = {
            let mut book = self.book();
            let pending = book.take_pending(request_id);
            book.release_into(pending, &mut released);
            if book.is_current(request_id) {
                book.in_flight = None;
                self.inner.state_tx.send_replace(prior);
                true
            } else {
                false
            }
        };
        warn!(
            "Submission {} abandoned before completion; released {} handle(s)",
            request_id,
            released.len()
        );
        self.notify_released(&released);
        if restored {
            self.notify(|o| o.on_discarded(request_id));
        }
    }

    // ── Artifacts ────────────────────────────────────────────────────────

    /// Bytes behind a live handle.
    pub fn artifact_bytes(&self, handle: ArtifactHandle) -> Option<Bytes> {
        self.book().resources.get(handle)
    }

    /// `data:application/pdf;base64,…` for a live handle.
    pub fn data_uri(&self, handle: ArtifactHandle) -> Option<String> {
        self.book().resources.data_uri(handle, PDF_MIME_TYPE)
    }

    pub fn is_live(&self, handle: ArtifactHandle) -> bool {
        self.book().resources.is_live(handle)
    }

    pub fn live_handle_count(&self) -> usize {
        self.book().resources.live_count()
    }

    pub fn released_handle_count(&self) -> u64 {
        self.book().resources.released_count()
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Release every live handle and stop accepting submissions.
    ///
    /// The published state returns to `Idle`. A submission still in flight
    /// runs to completion but its result is discarded.
    pub fn teardown(&self) {
        let released = {
            let mut book = self.book();
            if book.torn_down {
                return;
            }
            book.torn_down = true;
            book.in_flight = None;
            book.current = None;
            book.form = InputForm::default();
            let released = book.resources.release_all();
            self.inner.state_tx.send_replace(PipelineState::Idle);
            released
        };
        info!("Pipeline torn down; released {} handle(s)", released.len());
        self.notify_released(&released);
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn book(&self) -> MutexGuard<'_, Book> {
        self.inner.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn file_name(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Resume => &self.inner.config.resume_file_name,
            DocumentKind::CoverLetter => &self.inner.config.cover_letter_file_name,
        }
    }

    fn notify(&self, event: impl FnOnce(&dyn PipelineObserver)) {
        if let Some(ref observer) = self.inner.config.observer {
            event(observer.as_ref());
        }
    }

    fn notify_released(&self, handles: &[ArtifactHandle]) {
        for &handle in handles {
            self.notify(|o| o.on_handle_released(handle));
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state_tx.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobDescriptionPolicy;
    use crate::error::{ConversionError, RemoteError};
    use crate::pipeline::generate::GenerationResult;
    use crate::state::FailureStage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready, task};

    // ── Fakes ────────────────────────────────────────────────────────────

    /// Answers with queued results; optionally waits on a gate first.
    #[derive(Default)]
    struct FakeGenerator {
        calls: AtomicUsize,
        results: Mutex<VecDeque<Result<GenerationResult, RemoteError>>>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl FakeGenerator {
        fn answering(results: Vec<Result<GenerationResult, RemoteError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                ..Default::default()
            })
        }

        fn gated(result: Result<GenerationResult, RemoteError>) -> (Arc<Self>, oneshot::Sender<()>) {
            let (tx, rx) = oneshot::channel();
            let generator = Self::answering(vec![result]);
            *generator.gate.lock().unwrap() = Some(rx);
            (generator, tx)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for FakeGenerator {
        async fn generate(
            &self,
            _file: &UploadCandidate,
            _job_description: &str,
        ) -> Result<GenerationResult, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RemoteError::Transport("no scripted result".into())))
        }
    }

    /// Converts by source: sources containing "FAIL" fail, sources
    /// containing "WAIT" hold on the gate, everything else becomes a tiny PDF.
    #[derive(Default)]
    struct FakeConverter {
        calls: AtomicUsize,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl FakeConverter {
        fn gated() -> (Arc<Self>, oneshot::Sender<()>) {
            let (tx, rx) = oneshot::channel();
            let converter = Arc::new(Self::default());
            *converter.gate.lock().unwrap() = Some(rx);
            (converter, tx)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactConverter for FakeConverter {
        async fn convert(&self, source: &str) -> Result<Bytes, ConversionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source.contains("WAIT") {
                let gate = self.gate.lock().unwrap().take();
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
            }
            if source.contains("FAIL") {
                return Err(ConversionError::Status {
                    status: 500,
                    message: "LaTeX compilation failed".into(),
                    details: None,
                });
            }
            Ok(Bytes::from(format!("%PDF-1.7 {source}")))
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        released: AtomicUsize,
        discarded: AtomicUsize,
    }

    impl PipelineObserver for CountingObserver {
        fn on_handle_released(&self, _handle: ArtifactHandle) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn on_discarded(&self, _request_id: u64) {
            self.discarded.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn generated(resume: &str, cover: &str, suggestions: &[&str]) -> GenerationResult {
        GenerationResult {
            optimized_resume_source: resume.to_string(),
            optimized_cover_letter_source: cover.to_string(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn resume_pdf() -> UploadCandidate {
        UploadCandidate::new("resume.pdf", PDF_MIME_TYPE, b"%PDF-1.4 resume".to_vec())
    }

    fn pipeline_with(
        mode: ConversionMode,
        generator: Arc<FakeGenerator>,
        converter: Arc<FakeConverter>,
    ) -> Pipeline {
        let config = PipelineConfig::builder()
            .conversion_mode(mode)
            .build()
            .unwrap();
        Pipeline::new(config, generator, converter)
    }

    // ── Guard ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn submit_without_file_is_noop() {
        let generator = FakeGenerator::answering(vec![]);
        let converter = Arc::new(FakeConverter::default());
        let p = pipeline_with(ConversionMode::Concurrent, generator.clone(), converter.clone());

        let outcome = p.submit(None, "Senior backend engineer").await;

        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::MissingFile));
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(generator.calls(), 0);
        assert_eq!(converter.calls(), 0);
    }

    #[tokio::test]
    async fn guard_revalidates_inputs() {
        let generator = FakeGenerator::answering(vec![]);
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator.clone(),
            Arc::new(FakeConverter::default()),
        );

        let docx = UploadCandidate::new("cv.docx", "application/msword", b"PK".to_vec());
        assert!(matches!(
            p.submit(Some(&docx), "Engineer").await,
            SubmitOutcome::Rejected(Rejection::InvalidFile(_))
        ));
        assert_eq!(
            p.submit(Some(&resume_pdf()), "   ").await,
            SubmitOutcome::Rejected(Rejection::EmptyJobDescription)
        );
        assert_eq!(generator.calls(), 0);
        assert_eq!(p.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn url_policy_rejects_malformed_description() {
        let config = PipelineConfig::builder()
            .job_description_policy(JobDescriptionPolicy::Url)
            .build()
            .unwrap();
        let generator = FakeGenerator::answering(vec![]);
        let p = Pipeline::new(config, generator.clone(), Arc::new(FakeConverter::default()));

        let outcome = p.submit(Some(&resume_pdf()), "not a url").await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Rejected(Rejection::InvalidJobDescription(_))
        ));
        assert_eq!(generator.calls(), 0);
    }

    // ── Happy path ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn successful_submission_is_ready_with_two_live_handles() {
        for mode in [ConversionMode::Sequential, ConversionMode::Concurrent] {
            let generator = FakeGenerator::answering(vec![Ok(generated(
                "<tex>resume",
                "<tex>cover",
                &["Add Kubernetes experience", "Quantify impact", "Trim summary"],
            ))]);
            let converter = Arc::new(FakeConverter::default());
            let p = pipeline_with(mode, generator, converter.clone());

            let outcome = p.submit(Some(&resume_pdf()), "Senior backend engineer").await;
            assert_eq!(outcome, SubmitOutcome::Ready { request_id: 1 }, "{mode:?}");

            let PipelineState::Ready(pair) = p.state() else {
                panic!("expected Ready, got {:?}", p.state());
            };
            assert_eq!(
                pair.suggestions,
                vec!["Add Kubernetes experience", "Quantify impact", "Trim summary"]
            );
            assert_eq!(p.live_handle_count(), 2);
            assert!(pair.handles().iter().all(|h| p.is_live(*h)));
            assert_eq!(pair.resume.file_name, "optimized-resume.pdf");
            assert_eq!(pair.cover_letter.file_name, "cover-letter.pdf");
            assert_eq!(
                p.artifact_bytes(pair.resume.handle).as_deref(),
                Some(&b"%PDF-1.7 <tex>resume"[..])
            );
            assert_eq!(converter.calls(), 2);
        }
    }

    #[tokio::test]
    async fn submit_current_uses_form_inputs() {
        let generator = FakeGenerator::answering(vec![Ok(generated("r", "c", &[]))]);
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator,
            Arc::new(FakeConverter::default()),
        );

        assert!(!p.can_submit());
        assert_eq!(
            p.submit_current().await,
            SubmitOutcome::Rejected(Rejection::MissingFile)
        );

        assert!(p.select_file(Some(resume_pdf())).is_valid());
        assert!(p.set_job_description("Platform engineer").is_valid());
        assert!(p.can_submit());
        assert_eq!(p.submit_current().await, SubmitOutcome::Ready { request_id: 1 });
    }

    // ── Failures ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn generation_failure_skips_conversion() {
        let generator = FakeGenerator::answering(vec![Err(RemoteError::Status {
            status: 500,
            message: "OpenAI API error: rate limited".into(),
            details: Some("rate limited".into()),
            raw_output: None,
        })]);
        let converter = Arc::new(FakeConverter::default());
        let p = pipeline_with(ConversionMode::Concurrent, generator, converter.clone());

        let outcome = p.submit(Some(&resume_pdf()), "Engineer").await;

        assert_eq!(outcome, SubmitOutcome::Failed { request_id: 1 });
        assert_eq!(converter.calls(), 0);
        let error = p.state().error().cloned().expect("Failed state");
        assert_eq!(error.stage, FailureStage::Generation);
        assert_eq!(error.message, "OpenAI API error: rate limited");
        assert_eq!(p.live_handle_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_partial_failure_releases_successful_handle() {
        let generator = FakeGenerator::answering(vec![Ok(generated("resume ok", "cover FAIL", &[]))]);
        let converter = Arc::new(FakeConverter::default());
        let observer = Arc::new(CountingObserver::default());
        let config = PipelineConfig::builder()
            .observer(observer.clone())
            .build()
            .unwrap();
        let p = Pipeline::new(config, generator, converter.clone());

        let outcome = p.submit(Some(&resume_pdf()), "Engineer").await;

        assert_eq!(outcome, SubmitOutcome::Failed { request_id: 1 });
        assert_eq!(converter.calls(), 2);
        assert_eq!(p.live_handle_count(), 0);
        assert_eq!(p.released_handle_count(), 1);
        assert_eq!(observer.released.load(Ordering::SeqCst), 1);
        let error = p.state().error().cloned().unwrap();
        assert_eq!(error.stage, FailureStage::Conversion(DocumentKind::CoverLetter));
        assert_eq!(error.message, "LaTeX compilation failed");
    }

    #[tokio::test]
    async fn sequential_resume_failure_skips_cover_letter() {
        let generator = FakeGenerator::answering(vec![Ok(generated("FAIL", "cover", &[]))]);
        let converter = Arc::new(FakeConverter::default());
        let p = pipeline_with(ConversionMode::Sequential, generator, converter.clone());

        assert_eq!(
            p.submit(Some(&resume_pdf()), "Engineer").await,
            SubmitOutcome::Failed { request_id: 1 }
        );
        assert_eq!(converter.calls(), 1);
        assert_eq!(p.live_handle_count(), 0);
    }

    #[tokio::test]
    async fn both_conversions_failing_reports_resume() {
        let generator = FakeGenerator::answering(vec![Ok(generated("FAIL r", "FAIL c", &[]))]);
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator,
            Arc::new(FakeConverter::default()),
        );

        p.submit(Some(&resume_pdf()), "Engineer").await;
        assert_eq!(
            p.state().error().map(|e| e.stage),
            Some(FailureStage::Conversion(DocumentKind::Resume))
        );
        assert_eq!(p.released_handle_count(), 0);
    }

    #[tokio::test]
    async fn failure_keeps_previous_pair_on_display() {
        let generator = FakeGenerator::answering(vec![
            Ok(generated("r1", "c1", &["first"])),
            Err(RemoteError::Transport("connection refused".into())),
        ]);
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator,
            Arc::new(FakeConverter::default()),
        );

        p.submit(Some(&resume_pdf()), "Engineer").await;
        let PipelineState::Ready(first) = p.state() else {
            panic!("expected Ready");
        };
        assert_eq!(
            p.submit(Some(&resume_pdf()), "Engineer").await,
            SubmitOutcome::Failed { request_id: 2 }
        );

        let state = p.state();
        assert_eq!(state.artifacts(), Some(&first));
        assert!(first.handles().iter().all(|h| p.is_live(*h)));
        assert_eq!(p.live_handle_count(), 2);
    }

    // ── Replacement & concurrency ────────────────────────────────────────

    #[tokio::test]
    async fn resubmission_releases_previous_pair_before_exposing_new() {
        let generator = FakeGenerator::answering(vec![
            Ok(generated("r1", "c1", &["one"])),
            Ok(generated("r2", "c2", &["two"])),
        ]);
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator,
            Arc::new(FakeConverter::default()),
        );
        let mut rx = p.subscribe();

        p.submit(Some(&resume_pdf()), "Engineer").await;
        let PipelineState::Ready(pair1) = p.state() else {
            panic!("expected Ready");
        };

        // Watch the transition from the outside: when Ready(pair2) becomes
        // visible, none of pair1's handles may still be live.
        let watcher = {
            let p = p.clone();
            let pair1 = pair1.clone();
            tokio::spawn(async move {
                loop {
                    rx.changed().await.unwrap();
                    let state = rx.borrow_and_update().clone();
                    if let PipelineState::Ready(pair) = state {
                        if pair.request_id == 2 {
                            return pair1.handles().iter().all(|h| !p.is_live(*h));
                        }
                    }
                }
            })
        };

        assert_eq!(
            p.submit(Some(&resume_pdf()), "Engineer").await,
            SubmitOutcome::Ready { request_id: 2 }
        );
        assert!(watcher.await.unwrap(), "pair1 handles still live when pair2 appeared");

        let PipelineState::Ready(pair2) = p.state() else {
            panic!("expected Ready");
        };
        assert_eq!(pair2.suggestions, vec!["two"]);
        assert_eq!(p.live_handle_count(), 2);
        assert_eq!(p.released_handle_count(), 2);
        assert!(pair1.handles().iter().all(|h| p.artifact_bytes(*h).is_none()));
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_rejected() {
        let (generator, gate) = FakeGenerator::gated(Ok(generated("r", "c", &["only"])));
        let converter = Arc::new(FakeConverter::default());
        let p = pipeline_with(ConversionMode::Concurrent, generator.clone(), converter.clone());
        let file = resume_pdf();

        let mut first = task::spawn(p.submit(Some(&file), "First job"));
        assert_pending!(first.poll());
        assert!(p.state().is_submitting());

        let second = p.submit(Some(&file), "Second job").await;
        assert_eq!(second, SubmitOutcome::Rejected(Rejection::Busy));
        assert_eq!(generator.calls(), 1);
        assert!(p.state().is_submitting());

        gate.send(()).unwrap();
        assert!(first.is_woken());
        let outcome = assert_ready!(first.poll());
        assert_eq!(outcome, SubmitOutcome::Ready { request_id: 1 });
        assert_eq!(converter.calls(), 2);

        let PipelineState::Ready(pair) = p.state() else {
            panic!("expected Ready");
        };
        assert_eq!(pair.suggestions, vec!["only"]);
    }

    #[tokio::test]
    async fn previous_pair_visible_while_submitting() {
        let generator = FakeGenerator::answering(vec![Ok(generated("r1", "c1", &[]))]);
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator.clone(),
            Arc::new(FakeConverter::default()),
        );
        p.submit(Some(&resume_pdf()), "Engineer").await;
        let PipelineState::Ready(first) = p.state() else {
            panic!("expected Ready");
        };

        let (tx, rx) = oneshot::channel();
        *generator.gate.lock().unwrap() = Some(rx);
        generator
            .results
            .lock()
            .unwrap()
            .push_back(Ok(generated("r2", "c2", &[])));

        let file = resume_pdf();
        let mut second = task::spawn(p.submit(Some(&file), "Engineer"));
        assert_pending!(second.poll());
        match p.state() {
            PipelineState::Submitting { request_id, previous } => {
                assert_eq!(request_id, 2);
                assert_eq!(previous.as_ref(), Some(&first));
            }
            other => panic!("expected Submitting, got {other:?}"),
        }

        tx.send(()).unwrap();
        assert_eq!(assert_ready!(second.poll()), SubmitOutcome::Ready { request_id: 2 });
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn teardown_releases_everything_and_blocks_submissions() {
        let generator = FakeGenerator::answering(vec![Ok(generated("r", "c", &[]))]);
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator,
            Arc::new(FakeConverter::default()),
        );
        p.submit(Some(&resume_pdf()), "Engineer").await;
        assert_eq!(p.live_handle_count(), 2);

        p.teardown();
        assert_eq!(p.live_handle_count(), 0);
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(
            p.submit(Some(&resume_pdf()), "Engineer").await,
            SubmitOutcome::Rejected(Rejection::TornDown)
        );

        // Idempotent.
        p.teardown();
        assert_eq!(p.released_handle_count(), 2);
    }

    #[tokio::test]
    async fn response_after_teardown_is_discarded() {
        let (generator, gate) = FakeGenerator::gated(Ok(generated("r", "c", &[])));
        let converter = Arc::new(FakeConverter::default());
        let observer = Arc::new(CountingObserver::default());
        let config = PipelineConfig::builder()
            .observer(observer.clone())
            .build()
            .unwrap();
        let p = Pipeline::new(config, generator, converter.clone());
        let file = resume_pdf();

        let mut in_flight = task::spawn(p.submit(Some(&file), "Engineer"));
        assert_pending!(in_flight.poll());

        p.teardown();
        gate.send(()).unwrap();

        assert_eq!(
            assert_ready!(in_flight.poll()),
            SubmitOutcome::Discarded { request_id: 1 }
        );
        assert_eq!(converter.calls(), 0);
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(p.live_handle_count(), 0);
        assert_eq!(observer.discarded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_during_conversion_releases_late_artifact() {
        let generator = FakeGenerator::answering(vec![Ok(generated("r", "c WAIT", &[]))]);
        let (converter, gate) = FakeConverter::gated();
        let observer = Arc::new(CountingObserver::default());
        let config = PipelineConfig::builder()
            .conversion_mode(ConversionMode::Concurrent)
            .observer(observer.clone())
            .build()
            .unwrap();
        let p = Pipeline::new(config, generator, converter.clone());
        let file = resume_pdf();

        let mut in_flight = task::spawn(p.submit(Some(&file), "Engineer"));
        assert_pending!(in_flight.poll());
        // Resume converted, cover letter still running.
        assert_eq!(p.live_handle_count(), 1);

        p.teardown();
        assert_eq!(p.live_handle_count(), 0);
        gate.send(()).unwrap();

        assert_eq!(
            assert_ready!(in_flight.poll()),
            SubmitOutcome::Discarded { request_id: 1 }
        );
        assert_eq!(converter.calls(), 2);
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(p.live_handle_count(), 0);
        assert_eq!(p.released_handle_count(), 2);
        assert_eq!(observer.released.load(Ordering::SeqCst), 2);
        assert_eq!(observer.discarded.load(Ordering::SeqCst), 1);
    }

    // ── Abandoned submissions ────────────────────────────────────────────

    #[tokio::test]
    async fn timed_out_submit_frees_the_pipeline() {
        let (generator, _gate) = FakeGenerator::gated(Ok(generated("r", "c", &[])));
        let p = pipeline_with(
            ConversionMode::Concurrent,
            generator.clone(),
            Arc::new(FakeConverter::default()),
        );
        let file = resume_pdf();

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            p.submit(Some(&file), "Engineer"),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(p.live_handle_count(), 0);

        // The scripted result was never consumed; the retry gets it.
        assert_eq!(
            p.submit(Some(&file), "Engineer").await,
            SubmitOutcome::Ready { request_id: 2 }
        );
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn dropped_submit_releases_converted_artifact() {
        let generator = FakeGenerator::answering(vec![
            Ok(generated("r", "c WAIT", &[])),
            Ok(generated("r2", "c2", &[])),
        ]);
        let (converter, _gate) = FakeConverter::gated();
        let observer = Arc::new(CountingObserver::default());
        let config = PipelineConfig::builder()
            .conversion_mode(ConversionMode::Concurrent)
            .observer(observer.clone())
            .build()
            .unwrap();
        let p = Pipeline::new(config, generator, converter);
        let file = resume_pdf();

        let mut in_flight = task::spawn(p.submit(Some(&file), "Engineer"));
        assert_pending!(in_flight.poll());
        assert!(matches!(p.state(), PipelineState::Submitting { request_id: 1, .. }));
        assert_eq!(p.live_handle_count(), 1);

        drop(in_flight);

        assert_eq!(p.live_handle_count(), 0);
        assert_eq!(p.released_handle_count(), 1);
        assert_eq!(observer.released.load(Ordering::SeqCst), 1);
        assert_eq!(p.state(), PipelineState::Idle);
        assert_eq!(
            p.submit(Some(&file), "Engineer").await,
            SubmitOutcome::Ready { request_id: 2 }
        );
    }

    #[tokio::test]
    async fn dropped_resubmit_restores_previous_pair() {
        let (converter, _gate) = FakeConverter::gated();
        let generator = FakeGenerator::answering(vec![
            Ok(generated("r1", "c1", &["first"])),
            Ok(generated("r2", "c2 WAIT", &[])),
        ]);
        let p = pipeline_with(ConversionMode::Concurrent, generator, converter);
        let file = resume_pdf();

        p.submit(Some(&file), "Engineer").await;
        let first = p.state();
        let pair = first.artifacts().cloned().unwrap();

        let mut in_flight = task::spawn(p.submit(Some(&file), "Engineer"));
        assert_pending!(in_flight.poll());
        assert_eq!(p.live_handle_count(), 3);
        drop(in_flight);

        assert_eq!(p.state(), first);
        assert_eq!(p.live_handle_count(), 2);
        assert!(p.is_live(pair.resume.handle));
        assert!(p.is_live(pair.cover_letter.handle));
    }

    #[tokio::test]
    async fn data_uri_for_live_handle() {
        let generator = FakeGenerator::answering(vec![Ok(generated("r", "c", &[]))]);
        let p = pipeline_with(
            ConversionMode::Sequential,
            generator,
            Arc::new(FakeConverter::default()),
        );
        p.submit(Some(&resume_pdf()), "Engineer").await;
        let pair = p.state().artifacts().cloned().unwrap();
        let uri = p.data_uri(pair.cover_letter.handle).unwrap();
        assert!(uri.starts_with("data:application/pdf;base64,"));
    }
}
