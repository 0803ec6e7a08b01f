//! Binary for html2pdf-worker.
//!
//! By default runs the Lambda runtime loop; `render` does a one-shot local
//! conversion through the same renderer, for checking a Chromium install.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use html2pdf_worker::{
    aws, lambda, ChromiumRenderer, RenderEngine, WorkerConfig, WorkerConfigBuilder,
};
use lambda_runtime::{service_fn, LambdaEvent};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENVIRONMENT:
  PDF_BUCKET              Bucket holding in/ and out/ (required for the Lambda loop)
  PDF_QUEUE_URL           Queue to delete processed messages from (required for the Lambda loop)
  CHROMIUM_PATH           Existing headless Chromium executable
  CHROMIUM_ARCHIVE        .tar.gz with a Chromium build (e.g. /opt/chromium.tar.gz from a layer)
  CHROMIUM_ARCHIVE_URL    Download URL for that archive
  CHROMIUM_CACHE_DIR      Where the unpacked browser is cached (default /tmp/chromium on Lambda)
  RUST_LOG                Log filter, e.g. html2pdf_worker=debug

EXAMPLES:
  html2pdf-worker render page.html page.pdf
  CHROMIUM_PATH=/usr/bin/chromium html2pdf-worker render page.html page.pdf
"#;

/// Render HTML documents from S3 to PDF on SQS triggers.
#[derive(Parser, Debug)]
#[command(
    name = "html2pdf-worker",
    version,
    about = "Render HTML documents from S3 to PDF on SQS triggers",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Bucket holding both the input and output prefixes.
    #[arg(long, env = "PDF_BUCKET", global = true)]
    bucket: Option<String>,

    /// URL of the queue that triggers the function.
    #[arg(long, env = "PDF_QUEUE_URL", global = true)]
    queue_url: Option<String>,

    /// AWS region; the SDK default chain decides when unset.
    #[arg(long, env = "AWS_REGION", global = true)]
    region: Option<String>,

    /// Key prefix of input documents.
    #[arg(long, env = "PDF_INPUT_PREFIX", default_value = "in/", global = true)]
    input_prefix: String,

    /// Key prefix of rendered PDFs.
    #[arg(long, env = "PDF_OUTPUT_PREFIX", default_value = "out/", global = true)]
    output_prefix: String,

    /// Signed URL validity in seconds (1–604800).
    #[arg(long, env = "PDF_URL_TTL_SECS", default_value_t = 604_800, global = true,
          value_parser = clap::value_parser!(u64).range(1..=604_800))]
    url_ttl_secs: u64,

    /// Messages processed at once (one browser each).
    #[arg(short, long, env = "PDF_CONCURRENCY", default_value_t = 10, global = true)]
    concurrency: usize,

    /// Per-render timeout in seconds.
    #[arg(long, env = "PDF_RENDER_TIMEOUT", default_value_t = 20, global = true)]
    render_timeout: u64,

    /// Stop waiting on pipelines this long before the invocation deadline (ms).
    #[arg(long, env = "PDF_DEADLINE_MARGIN_MS", default_value_t = 1500, global = true)]
    deadline_margin_ms: u64,

    /// Print background colours and images.
    #[arg(long, env = "PDF_PRINT_BACKGROUND", default_value_t = true,
          action = clap::ArgAction::Set, global = true)]
    print_background: bool,

    /// Return failed ids as a partial-batch response instead of failing the invocation.
    #[arg(long, env = "PDF_REPORT_ITEM_FAILURES", global = true)]
    report_item_failures: bool,

    /// Chromium executable; resolved automatically when unset.
    #[arg(long, env = "CHROMIUM_PATH", global = true)]
    chromium_path: Option<PathBuf>,

    /// Log line format.
    #[arg(long, env = "PDF_LOG_FORMAT", value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_VERBOSE", global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Lambda runtime loop (the default).
    Serve,
    /// Render a local HTML file to PDF and exit.
    Render {
        /// HTML document to print.
        input: PathBuf,
        /// Where to write the PDF.
        output: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn config_builder(&self) -> WorkerConfigBuilder {
        let mut b = WorkerConfig::builder()
            .bucket(self.bucket.clone().unwrap_or_default())
            .queue_url(self.queue_url.clone().unwrap_or_default())
            .input_prefix(&self.input_prefix)
            .output_prefix(&self.output_prefix)
            .url_ttl_secs(self.url_ttl_secs)
            .concurrency(self.concurrency)
            .render_timeout_secs(self.render_timeout)
            .deadline_margin_ms(self.deadline_margin_ms)
            .print_background(self.print_background)
            .report_item_failures(self.report_item_failures);
        if let Some(ref region) = self.region {
            b = b.region(region);
        }
        if let Some(ref path) = self.chromium_path {
            b = b.chromium_path(path);
        }
        b
    }
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // The Lambda log stream timestamps every line already.
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .with_current_span(true)
            .without_time()
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Some(Command::Render {
            ref input,
            ref output,
        }) => render_local(&cli, input, output).await,
        Some(Command::Serve) | None => serve(&cli).await,
    }
}

async fn serve(cli: &Cli) -> Result<()> {
    let config = cli
        .config_builder()
        .build()
        .context("Invalid worker configuration")?;
    info!(
        "Starting worker: bucket={}, concurrency={}",
        config.bucket, config.concurrency
    );

    let processor = Arc::new(
        aws::build_processor(config)
            .await
            .context("Failed to initialise worker")?,
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<_>| {
        lambda::handle_sqs_event(Arc::clone(&processor), event)
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
    .context("Lambda runtime stopped")
}

async fn render_local(cli: &Cli, input: &Path, output: &Path) -> Result<()> {
    let html = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Cannot read {}", input.display()))?;

    // Storage settings are irrelevant here; only the renderer fields matter.
    let config = cli
        .config_builder()
        .bucket("local")
        .queue_url("local")
        .build()
        .context("Invalid render configuration")?;

    // block_in_place keeps `config` borrowed while the possible archive
    // unpack runs off the async worker.
    let renderer = tokio::task::block_in_place(|| ChromiumRenderer::from_config(&config))
        .context("No usable Chromium")?;

    let start = Instant::now();
    let pdf = renderer
        .render(&html)
        .await
        .with_context(|| format!("Failed to render {}", input.display()))?;

    tokio::fs::write(output, &pdf)
        .await
        .with_context(|| format!("Cannot write {}", output.display()))?;
    info!(
        "Wrote {} ({} bytes) in {}ms",
        output.display(),
        pdf.len(),
        start.elapsed().as_millis()
    );
    Ok(())
}
