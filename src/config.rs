//! Configuration types for the HTML-to-PDF worker.
//!
//! All worker behaviour is controlled through [`WorkerConfig`], built via its
//! [`WorkerConfigBuilder`]. The config is built once at process start, wrapped
//! in an `Arc`, and shared read-only by every concurrent pipeline.

use crate::error::WorkerError;
use crate::progress::ProcessingObserver;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Longest validity a SigV4 presigned URL may have (7 days).
pub const MAX_URL_TTL_SECS: u64 = 604_800;

/// Content type of every stored output object.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Configuration for the worker.
///
/// # Example
/// ```rust
/// use html2pdf_worker::WorkerConfig;
///
/// let config = WorkerConfig::builder()
///     .bucket("catalog-arrow")
///     .queue_url("https://sqs.us-east-2.amazonaws.com/123456789012/pdf-processing")
///     .concurrency(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.output_key("msg-1"), "out/msg-1.pdf");
/// ```
#[derive(Clone)]
pub struct WorkerConfig {
    /// Bucket holding both the `in/` and `out/` namespaces.
    pub bucket: String,

    /// Queue the trigger reads from; messages are deleted here on success.
    pub queue_url: String,

    /// AWS region override. If None, the SDK default provider chain decides.
    pub region: Option<String>,

    /// Key prefix of input documents. Default: `in/`.
    pub input_prefix: String,

    /// Key prefix of rendered PDFs. Default: `out/`.
    pub output_prefix: String,

    /// Signed URL validity in seconds. Range: 1–604800. Default: 604800 (7 days).
    pub url_ttl_secs: u64,

    /// Maximum messages processed at once. Default: 10.
    ///
    /// Each in-flight message owns one browser process, so this is also the
    /// ceiling on simultaneous Chromium instances. 10 equals the largest
    /// SQS batch without a batching window, i.e. "everything at once" for a
    /// default trigger.
    ///
    /// Every message in a batch runs concurrently only while the batch size
    /// is at most this value. A trigger with a batching window can deliver
    /// more records; the surplus then waits for a free slot, so raise this
    /// (memory permitting) or cap the trigger's batch size to match.
    pub concurrency: usize,

    /// Per-render timeout in seconds. Default: 20.
    pub render_timeout_secs: u64,

    /// How long before the invocation deadline to stop waiting on pipelines (ms).
    /// Default: 1500.
    pub deadline_margin_ms: u64,

    /// Force background colours and images into the PDF. Default: true.
    pub print_background: bool,

    /// Return failed message ids as a partial-batch response instead of
    /// failing the whole invocation. Default: false.
    pub report_item_failures: bool,

    /// Explicit Chromium executable. If None, `chromium-auto` resolves one.
    pub chromium_path: Option<PathBuf>,

    /// Flags appended after the default Chromium launch flags.
    pub extra_chromium_args: Vec<String>,

    /// Optional event observer.
    pub observer: Option<Arc<dyn ProcessingObserver>>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            queue_url: String::new(),
            region: None,
            input_prefix: "in/".to_string(),
            output_prefix: "out/".to_string(),
            url_ttl_secs: MAX_URL_TTL_SECS,
            concurrency: 10,
            render_timeout_secs: 20,
            deadline_margin_ms: 1500,
            print_background: true,
            report_item_failures: false,
            chromium_path: None,
            extra_chromium_args: Vec::new(),
            observer: None,
        }
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("bucket", &self.bucket)
            .field("queue_url", &self.queue_url)
            .field("region", &self.region)
            .field("input_prefix", &self.input_prefix)
            .field("output_prefix", &self.output_prefix)
            .field("url_ttl_secs", &self.url_ttl_secs)
            .field("concurrency", &self.concurrency)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("deadline_margin_ms", &self.deadline_margin_ms)
            .field("print_background", &self.print_background)
            .field("report_item_failures", &self.report_item_failures)
            .field("chromium_path", &self.chromium_path)
            .field("extra_chromium_args", &self.extra_chromium_args)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ProcessingObserver>"))
            .finish()
    }
}

impl WorkerConfig {
    /// Create a new builder for `WorkerConfig`.
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder {
            config: Self::default(),
        }
    }

    /// `in/{content}.html`
    pub fn input_key(&self, content: &str) -> String {
        format!("{}{}.html", self.input_prefix, content)
    }

    /// `out/{message_id}.pdf`
    pub fn output_key(&self, message_id: &str) -> String {
        format!("{}{}.pdf", self.output_prefix, message_id)
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn deadline_margin(&self) -> Duration {
        Duration::from_millis(self.deadline_margin_ms)
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn queue_url(mut self, url: impl Into<String>) -> Self {
        self.config.queue_url = url.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    pub fn input_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.input_prefix = prefix.into();
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    pub fn url_ttl_secs(mut self, secs: u64) -> Self {
        self.config.url_ttl_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn deadline_margin_ms(mut self, ms: u64) -> Self {
        self.config.deadline_margin_ms = ms;
        self
    }

    pub fn print_background(mut self, v: bool) -> Self {
        self.config.print_background = v;
        self
    }

    pub fn report_item_failures(mut self, v: bool) -> Self {
        self.config.report_item_failures = v;
        self
    }

    pub fn chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chromium_path = Some(path.into());
        self
    }

    pub fn extra_chromium_args(mut self, args: Vec<String>) -> Self {
        self.config.extra_chromium_args = args;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ProcessingObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkerConfig, WorkerError> {
        let c = &self.config;
        if c.bucket.trim().is_empty() {
            return Err(WorkerError::MissingSetting { name: "bucket" });
        }
        if c.queue_url.trim().is_empty() {
            return Err(WorkerError::MissingSetting { name: "queue_url" });
        }
        if c.url_ttl_secs == 0 || c.url_ttl_secs > MAX_URL_TTL_SECS {
            return Err(WorkerError::InvalidConfig(format!(
                "Signed URL TTL must be 1–{MAX_URL_TTL_SECS}s, got {}",
                c.url_ttl_secs
            )));
        }
        if c.concurrency == 0 {
            return Err(WorkerError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.input_prefix == c.output_prefix {
            return Err(WorkerError::InvalidConfig(format!(
                "Input and output prefixes must differ (both '{}')",
                c.input_prefix
            )));
        }
        Ok(self.config)
    }
}
