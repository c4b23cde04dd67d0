//! Observer trait for pipeline lifecycle events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::PipelineConfigBuilder::observer`] to receive events as a
//! submission moves through generation and conversion.
//!
//! The published [`crate::PipelineState`] tells a renderer *where* the
//! pipeline is; the observer additionally reports the steps in between
//! (generation finished, one document converted, a handle released) that a
//! progress bar or an audit log wants to see.
//!
//! # Example
//!
//! ```rust
//! use resume_tailor::{DocumentKind, PipelineConfig, PipelineObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     converted: AtomicUsize,
//! }
//!
//! impl PipelineObserver for CountingObserver {
//!     fn on_document_converted(&self, _request_id: u64, kind: DocumentKind, size_bytes: usize) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{kind} ready ({size_bytes} bytes)");
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { converted: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .observer(observer as Arc<dyn PipelineObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::resources::ArtifactHandle;
use crate::state::{DocumentKind, ErrorInfo};
use std::sync::Arc;

/// Called by the pipeline as a submission progresses.
///
/// Implementations must be `Send + Sync`: in concurrent conversion mode
/// `on_document_converted` may fire for both documents from the same task in
/// either order. All methods have default no-op implementations so callers
/// only override what they care about.
///
/// The pipeline never holds its internal lock while calling an observer, so
/// implementations may read pipeline state.
pub trait PipelineObserver: Send + Sync {
    /// A submission passed the entry guard and the state is now `Submitting`.
    fn on_submission_start(&self, request_id: u64) {
        let _ = request_id;
    }

    /// The generation service answered successfully.
    fn on_generation_complete(&self, request_id: u64, suggestion_count: usize) {
        let _ = (request_id, suggestion_count);
    }

    /// One document was converted and its handle created.
    fn on_document_converted(&self, request_id: u64, kind: DocumentKind, size_bytes: usize) {
        let _ = (request_id, kind, size_bytes);
    }

    /// A handle was released (replacement, failure cleanup, discard or teardown).
    fn on_handle_released(&self, handle: ArtifactHandle) {
        let _ = handle;
    }

    /// The submission ended in `Ready`.
    fn on_ready(&self, request_id: u64) {
        let _ = request_id;
    }

    /// The submission ended in `Failed`.
    fn on_failed(&self, request_id: u64, error: &ErrorInfo) {
        let _ = (request_id, error);
    }

    /// The submission resolved after it stopped being current; its result was dropped.
    fn on_discarded(&self, request_id: u64) {
        let _ = request_id;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ObserverHandle = Arc<dyn PipelineObserver>;
