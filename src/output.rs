//! Result types produced by a batch run.
//!
//! Ownership follows the pipeline: the splitter creates [`Chunk`]s, the chunk
//! processor turns each into an immutable [`ChunkOutcome`], the merger builds
//! one [`MergedDocument`] from the successful outcomes, and the orchestrator
//! wraps everything in a [`BatchResult`].

use crate::config::OutputFormat;
use crate::error::{BatchError, ChunkError};
use crate::job::PageMetrics;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A contiguous page range of the source document, submitted as one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based sequence index. Defines merge order.
    pub index: usize,
    /// 0-based half-open page range `[start, end)` in the source document.
    pub pages: Range<usize>,
    /// Sub-document submitted for this chunk. For the short-circuit path this
    /// is the source document itself.
    pub path: PathBuf,
    /// Where the fetched output archive is written.
    pub archive_path: PathBuf,
    /// Where the job output is unpacked.
    pub extract_dir: PathBuf,
}

impl Chunk {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Extracted files of one chunk, grouped by kind. Paths are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFiles {
    pub html: Vec<PathBuf>,
    pub markdown: Vec<PathBuf>,
    pub json: Vec<PathBuf>,
    pub other: Vec<PathBuf>,
}

impl ExtractedFiles {
    /// First artifact of the requested format.
    pub fn primary(&self, format: OutputFormat) -> Option<&Path> {
        let list = match format {
            OutputFormat::Html => &self.html,
            OutputFormat::Markdown => &self.markdown,
            OutputFormat::Json => &self.json,
        };
        list.first().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.html.len() + self.markdown.len() + self.json.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalised result of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Job completed; every page succeeded.
    Success {
        artifact: PathBuf,
        metrics: PageMetrics,
    },
    /// Job partially completed; the output is usable but some pages failed.
    PartialSuccess {
        artifact: PathBuf,
        metrics: PageMetrics,
        failed_pages: usize,
    },
    /// The chunk produced no usable output.
    Failure { error: ChunkError },
}

/// Everything known about one processed chunk. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub index: usize,
    pub pages: Range<usize>,
    pub source: PathBuf,
    /// Remote job id, if job creation got that far.
    pub job_id: Option<String>,
    pub status: ChunkStatus,
    /// Archives written while unpacking (removed by cleanup).
    pub archives: Vec<PathBuf>,
    /// Unpack directory, if anything was written there (removed by cleanup).
    pub extract_dir: Option<PathBuf>,
    pub files: ExtractedFiles,
    pub poll_attempts: u32,
    pub duration_ms: u64,
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, ChunkStatus::Failure { .. })
    }

    /// Path of the format-specific artifact for successful chunks.
    pub fn artifact(&self) -> Option<&Path> {
        match &self.status {
            ChunkStatus::Success { artifact, .. } | ChunkStatus::PartialSuccess { artifact, .. } => {
                Some(artifact)
            }
            ChunkStatus::Failure { .. } => None,
        }
    }

    pub fn metrics(&self) -> Option<PageMetrics> {
        match &self.status {
            ChunkStatus::Success { metrics, .. } | ChunkStatus::PartialSuccess { metrics, .. } => {
                Some(*metrics)
            }
            ChunkStatus::Failure { .. } => None,
        }
    }

    pub fn failed_pages(&self) -> usize {
        match &self.status {
            ChunkStatus::PartialSuccess { failed_pages, .. } => *failed_pages,
            _ => 0,
        }
    }

    pub fn error(&self) -> Option<&ChunkError> {
        match &self.status {
            ChunkStatus::Failure { error } => Some(error),
            _ => None,
        }
    }
}

/// Aggregate status of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    AllSucceeded,
    /// Some chunks failed; the successful ones were merged.
    PartialFailure { failed_chunks: Vec<usize> },
    /// Every chunk failed; nothing was merged.
    TotalFailure,
}

impl BatchStatus {
    /// Aggregate outcomes. `failed_chunks` is listed in ascending index order.
    pub fn from_outcomes(outcomes: &[ChunkOutcome]) -> Self {
        let mut failed: Vec<usize> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.index)
            .collect();
        failed.sort_unstable();

        if failed.len() == outcomes.len() {
            BatchStatus::TotalFailure
        } else if failed.is_empty() {
            BatchStatus::AllSucceeded
        } else {
            BatchStatus::PartialFailure {
                failed_chunks: failed,
            }
        }
    }
}

/// What the batch left on disk for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum BatchArtifact {
    /// Nothing usable was produced.
    None,
    /// Short-circuit path: the single job's output, unmerged.
    Single(PathBuf),
    /// Merged multi-chunk document.
    Merged(PathBuf),
    /// Unmergeable format: one file per successful chunk, in sequence order.
    PerChunk(Vec<PathBuf>),
}

/// A chunk dropped from the merge because its artifact was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSkip {
    pub index: usize,
    pub reason: String,
}

/// The single reconstructed output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedDocument {
    pub format: OutputFormat,
    pub content: String,
    /// Sequence indices of the chunks included, in output order.
    pub chunk_indices: Vec<usize>,
    pub skipped: Vec<MergeSkip>,
}

/// Batch-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_pages: usize,
    pub total_chunks: usize,
    pub succeeded_chunks: usize,
    pub failed_chunks: usize,
    /// Pages the service reported as failed inside partially completed jobs.
    pub failed_pages: usize,
    pub total_duration_ms: u64,
}

/// The outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub document: PathBuf,
    pub format: OutputFormat,
    /// True when the document fitted one job and was processed unsplit.
    pub short_circuit: bool,
    pub status: BatchStatus,
    pub artifact: BatchArtifact,
    /// Per-chunk outcomes in ascending sequence-index order.
    pub outcomes: Vec<ChunkOutcome>,
    pub merge_skips: Vec<MergeSkip>,
    pub stats: BatchStats,
}

impl BatchResult {
    /// Path of the merged document, if one was written.
    pub fn merged_path(&self) -> Option<&Path> {
        match &self.artifact {
            BatchArtifact::Merged(p) => Some(p),
            _ => None,
        }
    }

    /// Primary output path for single-file artifacts.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.artifact {
            BatchArtifact::Merged(p) | BatchArtifact::Single(p) => Some(p),
            _ => None,
        }
    }

    /// Outcomes that failed, in sequence order.
    pub fn failures(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Convert any chunk failure into an error.
    pub fn into_result(self) -> Result<Self, BatchError> {
        match &self.status {
            BatchStatus::AllSucceeded => Ok(self),
            BatchStatus::PartialFailure { failed_chunks } => Err(BatchError::PartialFailure {
                failed_chunks: failed_chunks.clone(),
                total: self.outcomes.len(),
            }),
            BatchStatus::TotalFailure => {
                let first_error = self
                    .outcomes
                    .iter()
                    .find_map(|o| o.error())
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Unknown error".to_string());
                Err(BatchError::AllChunksFailed {
                    total: self.outcomes.len(),
                    first_error,
                })
            }
        }
    }
}

/// Chunk plan for a document, computed without any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPlan {
    pub document: PathBuf,
    pub page_count: usize,
    pub max_pages_per_chunk: usize,
    /// Page ranges, one per chunk, in sequence order.
    pub chunks: Vec<Range<usize>>,
    /// True when the document is processed as one unsplit unit.
    pub short_circuit: bool,
}
