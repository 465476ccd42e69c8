//! Error types for the docintel-batch library.
//!
//! Three error types mirror three failure scopes:
//!
//! * [`BatchError`] (**fatal**): the batch cannot proceed at all (unreadable
//!   or empty document, invalid configuration, output cannot be written).
//!   Returned as `Err(BatchError)` from the top-level `run_batch*` functions.
//!
//! * [`ChunkError`] (**non-fatal**): one chunk's remote job failed, timed out,
//!   or produced no usable output. Stored inside
//!   [`crate::output::ChunkStatus::Failure`] so sibling chunks keep going and
//!   the caller can see exactly which chunk failed and why.
//!
//! * [`ClientError`]: transport-level failure raised by a
//!   [`crate::client::JobClient`] implementation. The chunk processor converts
//!   it into a [`ChunkError::Remote`] tagged with the [`JobStep`] that failed.

use crate::config::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docintel-batch library.
///
/// Chunk-level failures use [`ChunkError`] and are stored in
/// [`crate::output::ChunkOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF parsed but has no pages.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// Writing a chunk sub-document failed.
    #[error("Failed to write chunk {index} of '{path}': {detail}")]
    SplitFailed {
        path: PathBuf,
        index: usize,
        detail: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The job client could not be constructed.
    #[error("Failed to initialise job client: {0}")]
    ClientInit(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Merge was requested for a format that has no merge rule.
    #[error("Output format '{format}' cannot be merged across chunks")]
    UnsupportedMerge { format: OutputFormat },

    /// Every chunk failed; there is nothing to merge.
    #[error("All {total} chunks failed.\nFirst error: {first_error}")]
    AllChunksFailed { total: usize, first_error: String },

    /// Some chunks succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::BatchResult::into_result`] when the
    /// caller wants to treat any chunk failure as an error.
    #[error("{}/{total} chunks failed during processing (chunks {failed_chunks:?})", failed_chunks.len())]
    PartialFailure {
        failed_chunks: Vec<usize>,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing an intermediate artifact failed for a reason other than
    /// the path already being gone.
    #[error("Failed to remove '{path}': {source}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// True for errors that mean the source document itself is unusable.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            BatchError::FileNotFound { .. }
                | BatchError::PermissionDenied { .. }
                | BatchError::InvalidInput { .. }
                | BatchError::DownloadFailed { .. }
                | BatchError::DownloadTimeout { .. }
                | BatchError::NotAPdf { .. }
                | BatchError::CorruptPdf { .. }
                | BatchError::EmptyDocument { .. }
        )
    }
}

/// The remote job step at which a chunk failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
    Create,
    Upload,
    Start,
    Poll,
    Fetch,
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStep::Create => "create",
            JobStep::Upload => "upload",
            JobStep::Start => "start",
            JobStep::Poll => "poll",
            JobStep::Fetch => "fetch",
        };
        f.write_str(s)
    }
}

/// A non-fatal error for a single chunk.
///
/// Stored in [`crate::output::ChunkStatus::Failure`]. The batch continues
/// unless ALL chunks fail.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ChunkError {
    /// A remote call failed. Never retried inside the batch.
    #[error("Chunk {chunk}: {step} step failed: {detail}")]
    Remote {
        chunk: usize,
        step: JobStep,
        detail: String,
    },

    /// Polling hit the attempt ceiling before the job reached a terminal state.
    #[error("Chunk {chunk}: timeout after {attempts} status polls")]
    Timeout { chunk: usize, attempts: u32 },

    /// The remote service reported the job as failed.
    #[error("Chunk {chunk}: job {job_id} failed: {message}")]
    JobFailed {
        chunk: usize,
        job_id: String,
        message: String,
    },

    /// The job finished but no artifact of the requested format was delivered.
    #[error("Chunk {chunk}: no .{format} artifact in job output")]
    OutputMissing { chunk: usize, format: OutputFormat },

    /// The fetched output could not be written or extracted.
    #[error("Chunk {chunk}: failed to unpack job output: {detail}")]
    Unpack { chunk: usize, detail: String },
}

impl ChunkError {
    /// Sequence index of the chunk this error belongs to.
    pub fn chunk(&self) -> usize {
        match self {
            ChunkError::Remote { chunk, .. }
            | ChunkError::Timeout { chunk, .. }
            | ChunkError::JobFailed { chunk, .. }
            | ChunkError::OutputMissing { chunk, .. }
            | ChunkError::Unpack { chunk, .. } => *chunk,
        }
    }

    /// True when the chunk hit the poll ceiling.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChunkError::Timeout { .. })
    }
}

/// Transport-level error from a [`crate::client::JobClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, TLS, or timeout failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The service answered with a non-success status code.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The service did not return a URL for a file it was asked about.
    #[error("No {kind} URL returned for '{file}'")]
    MissingUrl { kind: &'static str, file: String },

    /// Local file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Http(e.to_string())
        }
    }
}
