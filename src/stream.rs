//! Streaming batch API: emit chunk outcomes as they complete.
//!
//! Unlike [`crate::batch::run_batch`], which waits for every chunk and then
//! merges, [`process_stream`] yields each [`ChunkOutcome`] as soon as its job
//! finishes. Outcomes arrive in completion order; sort by `index` before
//! merging. Nothing is merged or cleaned up: the extracted artifacts stay on
//! disk for the caller, who can hand the collected outcomes to
//! [`crate::pipeline::merge::merge`] and [`crate::pipeline::cleanup::cleanup`].

use crate::batch::prepare;
use crate::client::JobClient;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::ChunkOutcome;
use crate::pipeline::process;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of chunk outcomes.
pub type ChunkStream = Pin<Box<dyn Stream<Item = ChunkOutcome> + Send>>;

/// Split `input_str` and process its chunks, streaming outcomes.
///
/// Splitting happens before this returns, so input and PDF errors surface as
/// `Err` here; chunk failures arrive as outcomes with a failure status.
/// At most `config.concurrency` chunks are in flight.
///
/// # Example
/// ```rust,no_run
/// use docintel_batch::{process_stream, BatchConfig, ClientConfig, HttpJobClient};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Arc::new(HttpJobClient::new(ClientConfig::new("key"))?);
/// let config = BatchConfig::default();
/// let mut outcomes = process_stream("report.pdf", &config, client).await?;
/// while let Some(outcome) = outcomes.next().await {
///     match outcome.error() {
///         None => println!("chunk {} ready", outcome.index),
///         Some(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn process_stream(
    input_str: impl AsRef<str>,
    config: &BatchConfig,
    client: Arc<dyn JobClient>,
) -> Result<ChunkStream, BatchError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming batch: {}", input_str);

    let prepared = prepare(input_str, config).await?;
    let total = prepared.chunks.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // The resolved input may own a temp download; every in-flight future holds
    // it so it outlives the last upload.
    let resolved = Arc::new(prepared.resolved);
    let concurrency = config.concurrency.max(1);
    let config = config.clone();

    let s = stream::iter(prepared.chunks.into_iter().map(move |chunk| {
        let client = Arc::clone(&client);
        let cfg = config.clone();
        let input = Arc::clone(&resolved);
        async move {
            let outcome = process::process_chunk(client.as_ref(), &chunk, total, &cfg).await;
            drop(input);
            outcome
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
