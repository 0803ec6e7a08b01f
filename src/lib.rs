//! # html2pdf-worker
//!
//! Queue-triggered HTML-to-PDF rendering for AWS Lambda.
//!
//! Each SQS message names an HTML document in S3. The worker renders it with
//! headless Chromium, stores the PDF next to it, mints a signed download URL,
//! and deletes the message only once all of that succeeded. Anything that
//! fails stays on the queue for redelivery.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SQS record {"content": "report"}
//!  │
//!  ├─ 1. Validate  typed body, receipt handle present
//!  ├─ 2. Fetch     s3://{bucket}/in/report.html
//!  ├─ 3. Render    private Chromium process → PDF bytes
//!  ├─ 4. Store     s3://{bucket}/out/{messageId}.pdf (application/pdf)
//!  ├─ 5. Sign      7-day presigned GET URL
//!  └─ 6. Ack       DeleteMessage
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use html2pdf_worker::{aws, lambda, WorkerConfig};
//! use lambda_runtime::{service_fn, LambdaEvent};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lambda_runtime::Error> {
//!     let config = WorkerConfig::builder()
//!         .bucket("catalog-arrow")
//!         .queue_url("https://sqs.us-east-2.amazonaws.com/123456789012/pdf-processing")
//!         .build()?;
//!     let processor = Arc::new(aws::build_processor(config).await?);
//!     lambda_runtime::run(service_fn(move |event: LambdaEvent<_>| {
//!         lambda::handle_sqs_event(Arc::clone(&processor), event)
//!     }))
//!     .await
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html2pdf-worker` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aws;
pub mod batch;
pub mod config;
pub mod error;
pub mod lambda;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::BatchProcessor;
pub use config::{WorkerConfig, WorkerConfigBuilder, MAX_URL_TTL_SECS, PDF_CONTENT_TYPE};
pub use error::{MessageError, WorkerError};
pub use output::{BatchReport, BatchStats, MessageOutcome, SignedUrl, Stage};
pub use pipeline::input::{QueueMessage, RenderPayload};
pub use pipeline::queue::{MemoryQueue, MessageQueue, SqsQueue};
pub use pipeline::render::{ChromiumRenderer, RenderEngine};
pub use pipeline::storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};
pub use progress::{NoopObserver, ProcessingObserver};
