//! CLI binary for docintel-batch.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`
//! and `ClientConfig`, runs one batch, and reports per-chunk results.

use anyhow::{Context, Result};
use clap::Parser;
use docintel_batch::{
    plan, run_batch, BatchArtifact, BatchConfig, BatchProgressCallback, BatchResult, BatchStatus,
    ClientConfig, HttpJobClient, JobState, OutputFormat, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders one bar over the batch's chunks plus a log line per finished
/// chunk. Chunks finish out of order; lines are printed as they arrive.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Splitting PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_chunks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_chunks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Processing");
        self.bar.set_message("");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Submitting {total_chunks} chunk job(s)…"))
        ));
    }

    fn on_chunk_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
    }

    fn on_chunk_state(&self, index: usize, state: JobState) {
        self.bar.set_message(format!("chunk {index}: {state}"));
    }

    fn on_chunk_complete(&self, index: usize, total: usize, failed_pages: usize) {
        let secs = self.elapsed_secs(index);
        let note = if failed_pages > 0 {
            cyan(&format!("{failed_pages} page(s) failed"))
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{secs:.1}s")),
            note,
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_chunks: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total_chunks.saturating_sub(succeeded);
        if failed == 0 {
            eprintln!(
                "{} {} chunk(s) processed successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} chunks processed  ({} failed)",
                if failed == total_chunks { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total_chunks,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digitize a long PDF to HTML next to the source
  docbatch report.pdf

  # Markdown in Hindi, outputs under ./out
  docbatch -l hi-IN -f md -o out report.pdf

  # Show how the document would be chunked (no API key needed)
  docbatch --plan-only report.pdf

  # Keep the chunk PDFs for inspection, JSON summary on stdout
  docbatch --keep-chunks --json report.pdf > result.json

OUTPUT FILES:
  <stem>_merged.<fmt>            merged result (html, md)
  <stem>_outputs/chunk_NNN.json  per-chunk results (json)
  <stem>_output.<fmt>            documents that fit a single job
  <stem>_chunks/                 chunk PDFs (removed unless --keep-chunks)

ENVIRONMENT VARIABLES:
  SARVAM_API_KEY        Subscription key for the document-intelligence service
  DOCBATCH_BASE_URL     Override the service base URL
  RUST_LOG              Override log filtering (e.g. RUST_LOG=docintel_batch=debug)
"#;

/// Split large PDFs into page-bounded jobs, digitize them, merge the results.
#[derive(Parser, Debug)]
#[command(
    name = "docbatch",
    version,
    about = "Digitize PDFs of any length through a page-limited document-intelligence job service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for all outputs and intermediates (default: next to the input).
    #[arg(short, long, env = "DOCBATCH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Target language code, e.g. en-IN, hi-IN.
    #[arg(short, long, env = "DOCBATCH_LANGUAGE", default_value = "en-IN")]
    language: String,

    /// Output format: html, md, json.
    #[arg(short, long, env = "DOCBATCH_FORMAT", default_value = "html")]
    format: OutputFormat,

    /// Maximum pages per job.
    #[arg(long, env = "DOCBATCH_MAX_PAGES", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: u64,

    /// Chunks processed at the same time.
    #[arg(short, long, env = "DOCBATCH_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Milliseconds between two status polls of one job.
    #[arg(long, env = "DOCBATCH_POLL_INTERVAL_MS", default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Status polls per job before it is reported as timed out.
    #[arg(long, env = "DOCBATCH_MAX_POLLS", default_value_t = 60,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_polls: u32,

    /// Keep every intermediate file (chunk PDFs, archives, extracted outputs).
    #[arg(long, env = "DOCBATCH_NO_CLEANUP")]
    no_cleanup: bool,

    /// Keep the chunk PDFs but remove other intermediates.
    #[arg(long, env = "DOCBATCH_KEEP_CHUNKS")]
    keep_chunks: bool,

    /// Service subscription key.
    #[arg(long, env = "SARVAM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Service base URL.
    #[arg(long, env = "DOCBATCH_BASE_URL", default_value = ClientConfig::DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "DOCBATCH_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout for URL inputs, in seconds.
    #[arg(long, env = "DOCBATCH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the batch result as JSON on stdout.
    #[arg(long, env = "DOCBATCH_JSON")]
    json: bool,

    /// Print the chunk plan and exit; no job is submitted.
    #[arg(long)]
    plan_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCBATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCBATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCBATCH_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let max_pages = usize::try_from(cli.max_pages).context("--max-pages is too large")?;

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan_only {
        let plan = plan(&cli.input, max_pages)
            .await
            .context("Failed to plan document")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("Failed to serialise plan")?
            );
        } else {
            println!("File:          {}", cli.input);
            println!("Pages:         {}", plan.page_count);
            println!("Max per job:   {}", plan.max_pages_per_chunk);
            if plan.short_circuit {
                println!("Chunks:        1 (fits a single job, no split)");
            } else {
                println!("Chunks:        {}", plan.chunks.len());
                for (i, range) in plan.chunks.iter().enumerate() {
                    println!("  chunk_{:03}    pages {}-{}", i + 1, range.start + 1, range.end);
                }
            }
        }
        return Ok(());
    }

    // ── Build config and client ──────────────────────────────────────────
    let api_key = cli
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .context("No API key: pass --api-key or set SARVAM_API_KEY")?;
    let client = HttpJobClient::new(
        ClientConfig::new(api_key)
            .base_url(cli.base_url.clone())
            .request_timeout_secs(cli.api_timeout),
    )
    .context("Failed to create job client")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, max_pages, progress_cb)?;

    // ── Run batch ────────────────────────────────────────────────────────
    let result = run_batch(&cli.input, &config, Arc::new(client))
        .await
        .context("Batch failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    } else if !cli.quiet {
        print_summary(&result);
    }

    if let BatchStatus::PartialFailure { failed_chunks } = &result.status {
        if !cli.quiet && !cli.json {
            eprintln!(
                "{} chunks {:?} failed; rerun them separately if their pages matter",
                cyan("⚠"),
                failed_chunks
            );
        }
    }
    if result.status == BatchStatus::TotalFailure {
        result.into_result().context("No output produced")?;
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, max_pages: usize, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .language(cli.language.clone())
        .output_format(cli.format)
        .max_pages_per_chunk(max_pages)
        .concurrency(cli.concurrency)
        .poll_interval_ms(cli.poll_interval_ms)
        .max_poll_attempts(cli.max_polls)
        .cleanup(!cli.no_cleanup)
        .keep_chunk_artifacts(cli.keep_chunks)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(result: &BatchResult) {
    let s = &result.stats;
    eprintln!(
        "{}  {}/{} chunks  {} pages  {}ms",
        match result.status {
            BatchStatus::AllSucceeded => green("✔"),
            BatchStatus::PartialFailure { .. } => cyan("⚠"),
            BatchStatus::TotalFailure => red("✘"),
        },
        s.succeeded_chunks,
        s.total_chunks,
        s.total_pages,
        s.total_duration_ms,
    );
    if s.failed_pages > 0 {
        eprintln!("   {} page(s) reported failed by the service", s.failed_pages);
    }
    for skip in &result.merge_skips {
        eprintln!("   {} chunk {} left out of merge: {}", cyan("⚠"), skip.index, skip.reason);
    }
    for failed in result.failures() {
        if let Some(e) = failed.error() {
            eprintln!("   {} {}", red("✗"), dim(&e.to_string()));
        }
    }

    match &result.artifact {
        BatchArtifact::Merged(p) | BatchArtifact::Single(p) => {
            eprintln!("   →  {}", bold(&p.display().to_string()))
        }
        BatchArtifact::PerChunk(paths) => {
            for p in paths {
                eprintln!("   →  {}", bold(&p.display().to_string()));
            }
        }
        BatchArtifact::None => eprintln!("   {}", dim("no output written")),
    }
}
