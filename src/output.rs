//! Saving a ready artifact pair to disk.

use crate::error::TailorError;
use crate::orchestrator::Pipeline;
use crate::state::{Artifact, ArtifactPair};
use bytes::Bytes;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where [`save_artifacts`] put the two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedArtifacts {
    pub resume: PathBuf,
    pub cover_letter: PathBuf,
    pub suggestions: Vec<String>,
}

/// Write both documents of `pair` into `dir` under their download names.
///
/// Both handles must still be live in `pipeline`; the check happens before
/// anything is written. Each file is written to a temporary sibling and then
/// renamed into place, so a reader never sees a partial PDF.
pub async fn save_artifacts(
    pipeline: &Pipeline,
    pair: &ArtifactPair,
    dir: impl AsRef<Path>,
) -> Result<SavedArtifacts, TailorError> {
    let dir = dir.as_ref();
    let resume_bytes = live_bytes(pipeline, &pair.resume)?;
    let cover_bytes = live_bytes(pipeline, &pair.cover_letter)?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| TailorError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let resume = write_artifact(dir.join(&pair.resume.file_name), resume_bytes).await?;
    let cover_letter = write_artifact(dir.join(&pair.cover_letter.file_name), cover_bytes).await?;
    info!(
        "Saved {} and {}",
        resume.display(),
        cover_letter.display()
    );

    Ok(SavedArtifacts {
        resume,
        cover_letter,
        suggestions: pair.suggestions.clone(),
    })
}

fn live_bytes(pipeline: &Pipeline, artifact: &Artifact) -> Result<Bytes, TailorError> {
    pipeline
        .artifact_bytes(artifact.handle)
        .ok_or_else(|| TailorError::ArtifactReleased {
            handle: artifact.handle.to_string(),
        })
}

async fn write_artifact(path: PathBuf, bytes: Bytes) -> Result<PathBuf, TailorError> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
        .await
        .map_err(|e| TailorError::OutputWriteFailed {
            path: path.clone(),
            source: std::io::Error::other(e),
        })??;
    Ok(path)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TailorError> {
    let write_failed = |source: std::io::Error| TailorError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}
