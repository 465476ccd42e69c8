//! Chunk processor: drive one chunk through its remote job lifecycle.
//!
//! ```text
//! create ─▶ upload ─▶ start ─▶ poll … poll ─▶ fetch ─▶ unpack ─▶ pick artifact
//! ```
//!
//! Every step's failure is captured as a [`ChunkError`] inside the returned
//! [`ChunkOutcome`]; nothing propagates upward, so one bad chunk never aborts
//! its siblings. Remote calls are not retried here. Polling sleeps the
//! configured interval between attempts and gives up after the attempt
//! ceiling with [`ChunkError::Timeout`].

use crate::client::JobClient;
use crate::config::BatchConfig;
use crate::error::{ChunkError, ClientError, JobStep};
use crate::job::{Job, JobState, JobStatus};
use crate::output::{Chunk, ChunkOutcome, ChunkStatus, ExtractedFiles};
use crate::pipeline::unpack;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What a chunk left behind, recorded as the lifecycle advances so that a
/// failure at any step still reports its job id and on-disk leftovers.
#[derive(Default)]
struct Trace {
    job_id: Option<String>,
    poll_attempts: u32,
    archives: Vec<PathBuf>,
    extract_dir: Option<PathBuf>,
    files: ExtractedFiles,
}

/// Process one chunk end to end.
///
/// Always returns an outcome. Fires the per-chunk progress callbacks of
/// `config` (`on_chunk_start`, `on_chunk_state`, then exactly one of
/// `on_chunk_complete` / `on_chunk_error`).
pub async fn process_chunk(
    client: &dyn JobClient,
    chunk: &Chunk,
    total_chunks: usize,
    config: &BatchConfig,
) -> ChunkOutcome {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_chunk_start(chunk.index, total_chunks);
    }

    let mut trace = Trace::default();
    let status = match drive(client, chunk, config, &mut trace).await {
        Ok(status) => status,
        Err(error) => {
            warn!("{}", error);
            ChunkStatus::Failure { error }
        }
    };

    if let Some(ref cb) = config.progress_callback {
        match &status {
            ChunkStatus::Success { .. } => cb.on_chunk_complete(chunk.index, total_chunks, 0),
            ChunkStatus::PartialSuccess { failed_pages, .. } => {
                cb.on_chunk_complete(chunk.index, total_chunks, *failed_pages)
            }
            ChunkStatus::Failure { error } => {
                cb.on_chunk_error(chunk.index, total_chunks, &error.to_string())
            }
        }
    }

    ChunkOutcome {
        index: chunk.index,
        pages: chunk.pages.clone(),
        source: chunk.path.clone(),
        job_id: trace.job_id,
        status,
        archives: trace.archives,
        extract_dir: trace.extract_dir,
        files: trace.files,
        poll_attempts: trace.poll_attempts,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn drive(
    client: &dyn JobClient,
    chunk: &Chunk,
    config: &BatchConfig,
    trace: &mut Trace,
) -> Result<ChunkStatus, ChunkError> {
    let index = chunk.index;
    let remote = move |step: JobStep| move |e: ClientError| ChunkError::Remote {
        chunk: index,
        step,
        detail: e.to_string(),
    };

    let mut job = client
        .create_job(&config.language, config.output_format)
        .await
        .map_err(remote(JobStep::Create))?;
    trace.job_id = Some(job.id.clone());
    if let Some(ref cb) = config.progress_callback {
        cb.on_chunk_state(index, job.state);
    }

    client
        .upload(&job, &chunk.path)
        .await
        .map_err(remote(JobStep::Upload))?;
    observe(config, index, &mut job, JobState::Uploaded);

    client.start(&job).await.map_err(remote(JobStep::Start))?;
    observe(config, index, &mut job, JobState::Started);
    debug!("Chunk {}: job {} started", index, job.id);

    let status = wait_for_terminal(client, &mut job, index, config, trace).await?;

    if !status.state.has_output() {
        return Err(ChunkError::JobFailed {
            chunk: index,
            job_id: job.id.clone(),
            message: status
                .error_message
                .unwrap_or_else(|| "no error message reported".to_string()),
        });
    }

    let metrics = status.metrics();
    let outputs = client
        .fetch_outputs(&job)
        .await
        .map_err(remote(JobStep::Fetch))?;

    trace.extract_dir = Some(chunk.extract_dir.clone());
    let report = unpack::unpack_outputs(outputs, &chunk.archive_path, &chunk.extract_dir).await;
    trace.archives = report.archives;
    trace.files = report.result.map_err(|detail| ChunkError::Unpack {
        chunk: index,
        detail,
    })?;
    debug!("Chunk {}: {} files extracted", index, trace.files.len());

    let artifact = trace
        .files
        .primary(config.output_format)
        .map(|p| p.to_path_buf())
        .ok_or(ChunkError::OutputMissing {
            chunk: index,
            format: config.output_format,
        })?;

    if status.state == JobState::PartiallyCompleted {
        warn!(
            "Chunk {}: job partially completed, {}/{} pages failed",
            index, metrics.pages_failed, metrics.total_pages
        );
        return Ok(ChunkStatus::PartialSuccess {
            artifact,
            metrics,
            failed_pages: metrics.pages_failed,
        });
    }

    if metrics.pages_failed > 0 {
        warn!(
            "Chunk {}: job completed but reported {} failed pages",
            index, metrics.pages_failed
        );
    }
    info!(
        "Chunk {}: completed ({} pages) → {}",
        index,
        metrics.pages_succeeded,
        artifact.display()
    );
    Ok(ChunkStatus::Success { artifact, metrics })
}

/// Poll until the job reaches a terminal state or the attempt ceiling is hit.
///
/// Sleeps only between attempts. A transport error while polling fails the
/// chunk immediately.
async fn wait_for_terminal(
    client: &dyn JobClient,
    job: &mut Job,
    index: usize,
    config: &BatchConfig,
    trace: &mut Trace,
) -> Result<JobStatus, ChunkError> {
    let policy = config.poll_policy();
    loop {
        trace.poll_attempts += 1;
        let status = client
            .poll_status(job)
            .await
            .map_err(|e| ChunkError::Remote {
                chunk: index,
                step: JobStep::Poll,
                detail: e.to_string(),
            })?;
        observe(config, index, job, status.state);

        if status.state.is_terminal() {
            debug!(
                "Chunk {}: job {} is {} after {} polls",
                index, job.id, status.state, trace.poll_attempts
            );
            return Ok(status);
        }
        if trace.poll_attempts >= policy.max_attempts {
            return Err(ChunkError::Timeout {
                chunk: index,
                attempts: trace.poll_attempts,
            });
        }
        sleep(policy.interval).await;
    }
}

/// Record a state on the job and notify the callback when it changed.
fn observe(config: &BatchConfig, index: usize, job: &mut Job, state: JobState) {
    if job.state == state {
        return;
    }
    job.state = state;
    if let Some(ref cb) = config.progress_callback {
        cb.on_chunk_state(index, state);
    }
}
