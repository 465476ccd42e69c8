//! Configuration types for batch document processing.
//!
//! Batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Remote-service credentials live in a separate
//! [`ClientConfig`] that is handed to the job client at construction time, so
//! nothing in the library reads process-wide environment variables and two
//! batches with different keys can run side by side.

use crate::error::BatchError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for one batch run.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use docintel_batch::{BatchConfig, OutputFormat};
///
/// let config = BatchConfig::builder()
///     .language("hi-IN")
///     .output_format(OutputFormat::Markdown)
///     .max_pages_per_chunk(5)
///     .concurrency(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Target language code, e.g. "en-IN". Validated by the remote service,
    /// not locally. Default: "en-IN".
    pub language: String,

    /// Requested output format. Default: [`OutputFormat::Html`].
    ///
    /// HTML keeps table structure best; only `html` and `md` can be merged.
    pub output_format: OutputFormat,

    /// Maximum pages per chunk. Default: 5 (the remote per-job page limit).
    pub max_pages_per_chunk: usize,

    /// Remove intermediate artifacts once the batch result is final. Default: true.
    pub cleanup: bool,

    /// Keep the chunk PDFs even when `cleanup` is on. Default: false.
    pub keep_chunk_artifacts: bool,

    /// Maximum number of chunks in flight at once. Default: 4.
    ///
    /// Each in-flight chunk holds one remote job open. Lower this if the
    /// service starts rejecting job creation.
    pub concurrency: usize,

    /// Delay between two status polls of one job, in milliseconds. Default: 2000.
    pub poll_interval_ms: u64,

    /// Status polls per job before giving up with a timeout. Default: 60.
    pub max_poll_attempts: u32,

    /// Root directory for every persisted artifact (chunk directory, merged
    /// output). If None, the source document's directory is used, or the
    /// current directory for URL input.
    pub output_dir: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives chunk-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            language: "en-IN".to_string(),
            output_format: OutputFormat::default(),
            max_pages_per_chunk: 5,
            cleanup: true,
            keep_chunk_artifacts: false,
            concurrency: 4,
            poll_interval_ms: 2000,
            max_poll_attempts: 60,
            output_dir: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("language", &self.language)
            .field("output_format", &self.output_format)
            .field("max_pages_per_chunk", &self.max_pages_per_chunk)
            .field("cleanup", &self.cleanup)
            .field("keep_chunk_artifacts", &self.keep_chunk_artifacts)
            .field("concurrency", &self.concurrency)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("output_dir", &self.output_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// The polling policy each chunk processor enforces.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn max_pages_per_chunk(mut self, n: usize) -> Self {
        self.config.max_pages_per_chunk = n;
        self
    }

    pub fn cleanup(mut self, v: bool) -> Self {
        self.config.cleanup = v;
        self
    }

    pub fn keep_chunk_artifacts(mut self, v: bool) -> Self {
        self.config.keep_chunk_artifacts = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = n;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl BatchConfig {
    /// Check the constraints [`BatchConfigBuilder::build`] enforces.
    ///
    /// Fields are public, so a config built as a struct literal is checked
    /// again before any work starts.
    pub fn validate(&self) -> Result<(), BatchError> {
        let c = self;
        if c.max_pages_per_chunk == 0 {
            return Err(BatchError::InvalidConfig(
                "max_pages_per_chunk must be ≥ 1".into(),
            ));
        }
        if c.max_poll_attempts == 0 {
            return Err(BatchError::InvalidConfig(
                "max_poll_attempts must be ≥ 1".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(BatchError::InvalidConfig("language must not be empty".into()));
        }
        Ok(())
    }
}

/// Fixed-interval polling with an attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two consecutive status checks.
    pub interval: Duration,
    /// Status checks before the chunk is reported as timed out.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output format requested from the remote service.
///
/// | Format | Merge rule |
/// |--------|-----------|
/// | `html` | style hoisted from the first chunk, bodies joined with page breaks |
/// | `md`   | chunks concatenated with boundary comments and `---` |
/// | `json` | not mergeable; per-chunk files are returned as-is |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "md")]
    Markdown,
    #[serde(rename = "json")]
    Json,
}

impl OutputFormat {
    /// File extension of this format's artifacts (and the wire value).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }

    /// Whether per-chunk outputs of this format can be merged into one document.
    pub fn is_mergeable(&self) -> bool {
        !matches!(self, OutputFormat::Json)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(OutputFormat::Html),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(BatchError::InvalidConfig(format!(
                "unknown output format '{other}' (expected html, md, or json)"
            ))),
        }
    }
}

// ── Client configuration ─────────────────────────────────────────────────

/// Connection settings for [`crate::client::http::HttpJobClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Subscription key sent with every request.
    pub api_key: String,
    /// Service base URL. Default: `https://api.sarvam.ai`.
    pub base_url: String,
    /// Per-request timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.sarvam.ai";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 60,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
