//! Removal of intermediate artifacts once a batch result is final.
//!
//! Extract directories and fetched archives are always removed; the chunk
//! directory (holding the chunk PDFs) only when chunk artifacts are not kept.
//! A path that is already gone counts as cleaned, so running cleanup twice is
//! harmless.

use crate::error::BatchError;
use crate::output::ChunkOutcome;
use std::io;
use std::path::Path;
use tracing::debug;

/// Remove the intermediates recorded in `outcomes`, and `chunk_dir` unless
/// `keep_chunk_artifacts` is set.
///
/// Every path is attempted; the first real failure is returned.
pub async fn cleanup(
    chunk_dir: Option<&Path>,
    outcomes: &[ChunkOutcome],
    keep_chunk_artifacts: bool,
) -> Result<(), BatchError> {
    let mut first_error = None;

    for outcome in outcomes {
        if let Some(dir) = &outcome.extract_dir {
            record(&mut first_error, remove_dir(dir).await);
        }
        for archive in &outcome.archives {
            record(&mut first_error, remove_file(archive).await);
        }
    }

    if let Some(dir) = chunk_dir.filter(|_| !keep_chunk_artifacts) {
        record(&mut first_error, remove_dir(dir).await);
    }

    first_error.map_or(Ok(()), Err)
}

fn record(slot: &mut Option<BatchError>, result: Result<(), BatchError>) {
    if let Err(e) = result {
        slot.get_or_insert(e);
    }
}

async fn remove_dir(path: &Path) -> Result<(), BatchError> {
    settle(path, tokio::fs::remove_dir_all(path).await)
}

async fn remove_file(path: &Path) -> Result<(), BatchError> {
    settle(path, tokio::fs::remove_file(path).await)
}

fn settle(path: &Path, result: io::Result<()>) -> Result<(), BatchError> {
    match result {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BatchError::CleanupFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}
