//! Resource table: the owner of every converted document's bytes.
//!
//! A browser would hand out object URLs for the two PDFs and have to revoke
//! them by hand. Here the same discipline is explicit: [`ResourceTable`] is an
//! arena keyed by [`ArtifactHandle`], a handle is *live* from
//! [`ResourceTable::create_handle`] until [`ResourceTable::release`], and
//! releasing a handle that is not live is refused rather than repeated.
//! Dropping the table releases whatever is still live.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Opaque reference to one document held by a [`ResourceTable`].
///
/// Ids are never reused within a table, so a stale handle cannot alias a
/// newer document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ArtifactHandle(u64);

impl ArtifactHandle {
    #[cfg(test)]
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact-{}", self.0)
    }
}

/// Arena of live document buffers.
#[derive(Debug, Default)]
pub struct ResourceTable {
    next_id: u64,
    live: BTreeMap<ArtifactHandle, Bytes>,
    released: u64,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `bytes` and return a fresh live handle for them.
    pub fn create_handle(&mut self, bytes: Bytes) -> ArtifactHandle {
        self.next_id += 1;
        let handle = ArtifactHandle(self.next_id);
        debug!("Created {} ({} bytes)", handle, bytes.len());
        self.live.insert(handle, bytes);
        handle
    }

    /// Release a live handle.
    ///
    /// Returns `false` without touching anything when the handle is not live
    /// (already released, or issued by another table).
    pub fn release(&mut self, handle: ArtifactHandle) -> bool {
        match self.live.remove(&handle) {
            Some(_) => {
                self.released += 1;
                debug!("Released {}", handle);
                true
            }
            None => false,
        }
    }

    /// Release every live handle, returning them in creation order.
    pub fn release_all(&mut self) -> Vec<ArtifactHandle> {
        let handles: Vec<ArtifactHandle> = self.live.keys().copied().collect();
        self.live.clear();
        self.released += handles.len() as u64;
        handles
    }

    pub fn is_live(&self, handle: ArtifactHandle) -> bool {
        self.live.contains_key(&handle)
    }

    /// The document behind a live handle. Cloning `Bytes` does not copy.
    pub fn get(&self, handle: ArtifactHandle) -> Option<Bytes> {
        self.live.get(&handle).cloned()
    }

    /// Encode a live document as a `data:` URI, usable wherever an object URL would be.
    pub fn data_uri(&self, handle: ArtifactHandle, mime_type: &str) -> Option<String> {
        self.live
            .get(&handle)
            .map(|bytes| format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total handles released over the table's lifetime.
    pub fn released_count(&self) -> u64 {
        self.released
    }
}

impl Drop for ResourceTable {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            debug!("Releasing {} live handle(s) on teardown", self.live.len());
            self.release_all();
        }
    }
}
