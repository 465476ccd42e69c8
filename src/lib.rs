//! # docintel-batch
//!
//! Digitize PDF documents of any length through a remote document-intelligence
//! job service that only accepts a few pages per job.
//!
//! ## Why this crate?
//!
//! The service processes at most a handful of pages per job and runs each
//! job asynchronously (create, upload, start, poll, fetch). Long documents
//! therefore have to be cut into page-bounded chunks, each driven through its
//! own job, and the per-chunk outputs stitched back together in page order.
//! One failing chunk must not sink the rest.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Split    cut ≤ N-page chunk PDFs via lopdf (spawn_blocking)
//!  ├─ 3. Process  per chunk, concurrently: create → upload → start → poll → fetch → unpack
//!  ├─ 4. Merge    html/md outputs joined in sequence order
//!  └─ 5. Cleanup  remove chunk PDFs, archives, extracted files
//! ```
//!
//! A document that already fits one job skips splitting and merging and is
//! written to `<stem>_output.<fmt>` as-is.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docintel_batch::{run_batch, BatchConfig, BatchStatus, ClientConfig, HttpJobClient, OutputFormat};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(HttpJobClient::new(ClientConfig::new("my-api-key"))?);
//!     let config = BatchConfig::builder()
//!         .language("hi-IN")
//!         .output_format(OutputFormat::Markdown)
//!         .build()?;
//!
//!     let result = run_batch("report.pdf", &config, client).await?;
//!     if let BatchStatus::PartialFailure { failed_chunks } = &result.status {
//!         eprintln!("chunks {failed_chunks:?} failed");
//!     }
//!     println!("{:?}", result.output_path());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docbatch` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docintel-batch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{plan, run_batch, run_batch_sync};
pub use client::http::HttpJobClient;
pub use client::{JobClient, JobOutputs};
pub use config::{BatchConfig, BatchConfigBuilder, ClientConfig, OutputFormat, PollPolicy};
pub use error::{BatchError, ChunkError, ClientError, JobStep};
pub use job::{Job, JobState, JobStatus, PageDetail, PageMetrics};
pub use output::{
    BatchArtifact, BatchResult, BatchStats, BatchStatus, Chunk, ChunkOutcome, ChunkStatus, DocumentPlan,
    ExtractedFiles, MergeSkip, MergedDocument,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{process_stream, ChunkStream};
