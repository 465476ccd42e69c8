//! Batch orchestration: split, process every chunk, merge, clean up.
//!
//! [`run_batch`] waits for every chunk and returns one [`BatchResult`]. Use
//! [`crate::stream::process_stream`] instead to receive chunk outcomes as they
//! complete and merge them yourself.
//!
//! Chunks are processed concurrently, at most `config.concurrency` at a time.
//! Completion order is arbitrary; outcomes are sorted by sequence index
//! before aggregation, so merge order always follows page order.

use crate::client::JobClient;
use crate::config::{BatchConfig, OutputFormat};
use crate::error::BatchError;
use crate::output::{
    BatchArtifact, BatchResult, BatchStats, BatchStatus, Chunk, ChunkOutcome, DocumentPlan, MergeSkip,
};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::layout::ArtifactLayout;
use crate::pipeline::{cleanup, merge, process, split};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Download timeout used by [`plan`], which has no config.
const PLAN_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// A resolved, split document ready for processing.
pub(crate) struct Prepared {
    /// Keeps a downloaded input alive until processing is over.
    pub resolved: ResolvedInput,
    pub layout: ArtifactLayout,
    pub page_count: usize,
    pub chunks: Vec<Chunk>,
    /// Set only when the document was split.
    pub chunk_dir: Option<PathBuf>,
    pub short_circuit: bool,
}

/// Resolve `input`, count its pages, and either split it or wrap it whole.
///
/// A document of at most `max_pages_per_chunk` pages is never split and no
/// chunk directory is created. `config` is validated before the input is
/// touched.
pub(crate) async fn prepare(input_str: &str, config: &BatchConfig) -> Result<Prepared, BatchError> {
    config.validate()?;
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    let page_count = split::page_count(&pdf_path).await?;
    info!("PDF has {} pages", page_count);

    let root = match (&config.output_dir, resolved.is_downloaded()) {
        (Some(dir), _) => Some(dir.clone()),
        (None, true) => Some(PathBuf::from(".")),
        (None, false) => None,
    };
    let layout = ArtifactLayout::for_document(&pdf_path, root.as_deref());

    if split::fits_single_job(page_count, config.max_pages_per_chunk) {
        info!(
            "{} pages ≤ {} per job, processing as a single document",
            page_count, config.max_pages_per_chunk
        );
        let chunk = layout.whole_document(&pdf_path, page_count);
        return Ok(Prepared {
            resolved,
            layout,
            page_count,
            chunks: vec![chunk],
            chunk_dir: None,
            short_circuit: true,
        });
    }

    let chunks = split::split_document(&pdf_path, &layout, config.max_pages_per_chunk).await?;
    Ok(Prepared {
        resolved,
        chunk_dir: Some(layout.chunk_dir()),
        layout,
        page_count,
        chunks,
        short_circuit: false,
    })
}

/// Process a PDF file or URL as a batch of remote jobs.
///
/// # Returns
/// `Ok(BatchResult)` once every chunk has an outcome, including when some or
/// all chunks failed (see [`BatchResult::status`], or call
/// [`BatchResult::into_result`] to turn failures into errors).
///
/// # Errors
/// Only fatal problems: the input cannot be resolved or parsed, the document
/// has no pages, a chunk cannot be written, or the final artifact cannot be
/// written.
pub async fn run_batch(
    input_str: impl AsRef<str>,
    config: &BatchConfig,
    client: Arc<dyn JobClient>,
) -> Result<BatchResult, BatchError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting batch: {}", input_str);

    // ── Step 1: Resolve and split ────────────────────────────────────────
    let prepared = prepare(input_str, config).await?;
    let total_chunks = prepared.chunks.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total_chunks);
    }

    // ── Step 2: Process chunks concurrently ──────────────────────────────
    let mut outcomes = process_all(&client, &prepared.chunks, config).await;
    outcomes.sort_by_key(|o| o.index);
    let status = BatchStatus::from_outcomes(&outcomes);

    // ── Step 3: Produce the artifact ─────────────────────────────────────
    let (artifact, merge_skips) = if status == BatchStatus::TotalFailure {
        warn!("All {} chunks failed, nothing to merge", total_chunks);
        (BatchArtifact::None, Vec::new())
    } else if prepared.short_circuit {
        (write_single(&outcomes, &prepared.layout, config.output_format).await?, Vec::new())
    } else if config.output_format.is_mergeable() {
        write_merged(&outcomes, &prepared.layout, config).await?
    } else {
        (write_per_chunk(&outcomes, &prepared.layout, config.output_format).await?, Vec::new())
    };

    // ── Step 4: Cleanup ──────────────────────────────────────────────────
    if config.cleanup {
        if let Err(e) = cleanup::cleanup(
            prepared.chunk_dir.as_deref(),
            &outcomes,
            config.keep_chunk_artifacts,
        )
        .await
        {
            warn!("Cleanup incomplete: {}", e);
        }
    }

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let stats = BatchStats {
        total_pages: prepared.page_count,
        total_chunks,
        succeeded_chunks: succeeded,
        failed_chunks: total_chunks - succeeded,
        failed_pages: outcomes.iter().map(|o| o.failed_pages()).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} chunks succeeded, {}ms total",
        succeeded, total_chunks, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total_chunks, succeeded);
    }

    Ok(BatchResult {
        document: prepared.resolved.path().to_path_buf(),
        format: config.output_format,
        short_circuit: prepared.short_circuit,
        status,
        artifact,
        outcomes,
        merge_skips,
        stats,
    })
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    input_str: impl AsRef<str>,
    config: &BatchConfig,
    client: Arc<dyn JobClient>,
) -> Result<BatchResult, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(input_str, config, client))
}

/// Compute the chunk plan of a document without contacting the service.
pub async fn plan(input_str: impl AsRef<str>, max_pages_per_chunk: usize) -> Result<DocumentPlan, BatchError> {
    if max_pages_per_chunk == 0 {
        return Err(BatchError::InvalidConfig(
            "max_pages_per_chunk must be ≥ 1".into(),
        ));
    }
    let resolved = input::resolve_input(input_str.as_ref(), PLAN_DOWNLOAD_TIMEOUT_SECS).await?;
    let page_count = split::page_count(resolved.path()).await?;

    Ok(DocumentPlan {
        document: resolved.path().to_path_buf(),
        page_count,
        max_pages_per_chunk,
        chunks: split::plan_chunks(page_count, max_pages_per_chunk),
        short_circuit: split::fits_single_job(page_count, max_pages_per_chunk),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn process_all(
    client: &Arc<dyn JobClient>,
    chunks: &[Chunk],
    config: &BatchConfig,
) -> Vec<ChunkOutcome> {
    let total = chunks.len();
    stream::iter(chunks.iter().map(|chunk| {
        let client = Arc::clone(client);
        async move { process::process_chunk(client.as_ref(), chunk, total, config).await }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await
}

/// Short-circuit path: copy the single job's artifact to `<stem>_output.<fmt>`.
async fn write_single(
    outcomes: &[ChunkOutcome],
    layout: &ArtifactLayout,
    format: OutputFormat,
) -> Result<BatchArtifact, BatchError> {
    let Some(source) = outcomes.iter().find_map(|o| o.artifact()) else {
        return Ok(BatchArtifact::None);
    };
    let target = layout.output_path(format);
    copy_atomic(source, &target).await?;
    info!("Output written to {}", target.display());
    Ok(BatchArtifact::Single(target))
}

async fn write_merged(
    outcomes: &[ChunkOutcome],
    layout: &ArtifactLayout,
    config: &BatchConfig,
) -> Result<(BatchArtifact, Vec<MergeSkip>), BatchError> {
    let merged = merge::merge(outcomes, config.output_format, &config.language, layout.stem()).await?;
    if merged.chunk_indices.is_empty() {
        warn!("Every successful chunk was skipped during merge, no output written");
        return Ok((BatchArtifact::None, merged.skipped));
    }

    let target = layout.merged_path(config.output_format);
    write_atomic(&target, merged.content.as_bytes()).await?;
    info!(
        "Merged {} chunks into {}",
        merged.chunk_indices.len(),
        target.display()
    );
    Ok((BatchArtifact::Merged(target), merged.skipped))
}

/// Unmergeable formats: one copy per successful chunk, in sequence order.
async fn write_per_chunk(
    outcomes: &[ChunkOutcome],
    layout: &ArtifactLayout,
    format: OutputFormat,
) -> Result<BatchArtifact, BatchError> {
    let mut written = Vec::new();
    for outcome in outcomes {
        let Some(source) = outcome.artifact() else {
            continue;
        };
        let target = layout.per_chunk_path(outcome.index, format);
        copy_atomic(source, &target).await?;
        written.push(target);
    }
    info!(
        "{} output is not mergeable; wrote {} per-chunk files to {}",
        format,
        written.len(),
        layout.per_chunk_dir().display()
    );
    Ok(BatchArtifact::PerChunk(written))
}

async fn copy_atomic(source: &Path, target: &Path) -> Result<(), BatchError> {
    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| BatchError::OutputWriteFailed {
            path: target.to_path_buf(),
            source: e,
        })?;
    write_atomic(target, &bytes).await
}

/// Write to a `.tmp` sibling, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BatchError> {
    let write_failed = |e: std::io::Error| BatchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_tmp() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("out/doc_merged.md");
        write_atomic(&target, b"hello").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
        assert!(!tmp.path().join("out/doc_merged.md.tmp").exists());
    }

    #[tokio::test]
    async fn plan_rejects_zero_chunk_size() {
        let err = plan("whatever.pdf", 0).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn plan_reports_missing_file() {
        let err = plan("/no/such/file.pdf", 5).await.unwrap_err();
        assert!(err.is_invalid_input());
    }
}
