//! Progress-callback trait for chunk-level batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to follow a batch
//! as its chunks move through create, upload, start, poll and fetch.
//!
//! # Example
//!
//! ```rust
//! use docintel_batch::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, index: usize, total: usize, failed_pages: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("chunk {index}/{total} done ({done} so far, {failed_pages} pages failed)");
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::job::JobState;
use std::sync::Arc;

/// Called by the batch orchestrator and chunk processor.
///
/// Chunks run concurrently, so the per-chunk methods may be called from
/// several tasks at once. Implementations must synchronise shared state.
/// Every method defaults to a no-op.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after splitting, before any job is created.
    fn on_batch_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called when a chunk is about to create its remote job.
    ///
    /// `index` is the 1-based sequence index.
    fn on_chunk_start(&self, index: usize, total_chunks: usize) {
        let _ = (index, total_chunks);
    }

    /// Called whenever a chunk's job is observed in a new state.
    fn on_chunk_state(&self, index: usize, state: JobState) {
        let _ = (index, state);
    }

    /// Called when a chunk finished with usable output.
    ///
    /// `failed_pages` is non-zero for partially completed jobs.
    fn on_chunk_complete(&self, index: usize, total_chunks: usize, failed_pages: usize) {
        let _ = (index, total_chunks, failed_pages);
    }

    /// Called when a chunk failed. `error` is human-readable.
    fn on_chunk_error(&self, index: usize, total_chunks: usize, error: &str) {
        let _ = (index, total_chunks, error);
    }

    /// Called once after every chunk has an outcome.
    fn on_batch_complete(&self, total_chunks: usize, succeeded: usize) {
        let _ = (total_chunks, succeeded);
    }
}

/// Progress sink that ignores every event. Used when none is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
