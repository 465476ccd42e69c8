//! Remote job model: identity, lifecycle state, and page counters.
//!
//! The lifecycle is owned by the remote service. Locally we only record what
//! we did (`Created`, `Uploaded`, `Started`) and what polling observed.
//!
//! ```text
//! Created ──▶ Uploaded ──▶ Started ──┬──▶ Completed
//!                                     ├──▶ PartiallyCompleted
//!                                     └──▶ Failed
//! ```

use crate::config::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a remote job.
///
/// Deserialises both the local names and the service's own vocabulary
/// (`Accepted`, `Pending`, `Running`). Anything else maps to
/// [`JobState::Unknown`], which is treated as non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[serde(alias = "Accepted")]
    Created,
    #[serde(alias = "Pending")]
    Uploaded,
    #[serde(alias = "Running", alias = "InProgress")]
    Started,
    Completed,
    PartiallyCompleted,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::PartiallyCompleted | JobState::Failed
        )
    }

    /// Terminal states whose output can be fetched.
    pub fn has_output(&self) -> bool {
        matches!(self, JobState::Completed | JobState::PartiallyCompleted)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One remote processing request for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque identifier assigned by the service.
    pub id: String,
    pub language: String,
    pub output_format: OutputFormat,
    /// Last state we caused or observed.
    pub state: JobState,
}

impl Job {
    pub fn new(id: impl Into<String>, language: impl Into<String>, output_format: OutputFormat) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            output_format,
            state: JobState::Created,
        }
    }
}

/// Per-file page counters reported by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDetail {
    #[serde(default)]
    pub total_pages: usize,
    #[serde(default)]
    pub pages_succeeded: usize,
    /// Not every service version reports this; derived when absent.
    #[serde(default)]
    pub pages_failed: Option<usize>,
}

/// A single status observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(rename = "job_state")]
    pub state: JobState,
    #[serde(rename = "job_details", alias = "page_details", default)]
    pub page_details: Vec<PageDetail>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            page_details: Vec::new(),
            error_message: None,
        }
    }

    pub fn metrics(&self) -> PageMetrics {
        PageMetrics::from_details(&self.page_details)
    }
}

/// Aggregate page counters for one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub total_pages: usize,
    pub pages_succeeded: usize,
    pub pages_failed: usize,
}

impl PageMetrics {
    pub fn from_details(details: &[PageDetail]) -> Self {
        details.iter().fold(Self::default(), |acc, d| {
            let failed = d
                .pages_failed
                .unwrap_or_else(|| d.total_pages.saturating_sub(d.pages_succeeded));
            Self {
                total_pages: acc.total_pages + d.total_pages,
                pages_succeeded: acc.pages_succeeded + d.pages_succeeded,
                pages_failed: acc.pages_failed + failed,
            }
        })
    }
}
