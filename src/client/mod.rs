//! The boundary to the remote document-intelligence service.
//!
//! The orchestration core depends only on the [`JobClient`] trait. The real
//! HTTP implementation lives in [`http`]; tests plug in a scripted fake that
//! returns canned lifecycle transitions without touching the network.
//!
//! `create_job` and `start` are not idempotent on the service side. The chunk
//! processor calls each at most once per chunk.

pub mod http;

use crate::config::OutputFormat;
use crate::error::ClientError;
use crate::job::{Job, JobStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

/// Output files of a finished job, keyed by file name.
///
/// Multi-file outputs usually arrive as a single `.zip` entry.
pub type JobOutputs = BTreeMap<String, Vec<u8>>;

/// Remote job lifecycle: create → upload → start → poll → fetch.
///
/// Implementations must be `Send + Sync`: one client is shared read-only by
/// every chunk processor of a batch.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Create a job for the given language and output format.
    async fn create_job(&self, language: &str, format: OutputFormat) -> Result<Job, ClientError>;

    /// Transfer the chunk's source bytes to the job.
    async fn upload(&self, job: &Job, artifact: &Path) -> Result<(), ClientError>;

    /// Ask the service to start processing.
    async fn start(&self, job: &Job) -> Result<(), ClientError>;

    /// Read the job's current lifecycle state and page counters.
    async fn poll_status(&self, job: &Job) -> Result<JobStatus, ClientError>;

    /// Download every output file of a finished job.
    async fn fetch_outputs(&self, job: &Job) -> Result<JobOutputs, ClientError>;
}
