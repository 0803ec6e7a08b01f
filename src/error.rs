//! Error types for the html2pdf-worker library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`WorkerError`] — **Fatal / batch-level**: the worker cannot start
//!   (bad configuration, no Chromium), or a batch finished with at least one
//!   failed message and must be reported to the trigger as a failure.
//!
//! * [`MessageError`] — **Per message**: one message's pipeline failed
//!   (missing input, render crash, storage outage). It is stored inside
//!   [`crate::output::MessageOutcome`] and never aborts sibling messages in
//!   the same batch. A message that ends with one of these is left on the
//!   queue so redelivery can retry it.

use crate::output::Stage;
use thiserror::Error;

/// All fatal errors returned by the html2pdf-worker library.
///
/// Message-level failures use [`MessageError`] and are stored in
/// [`crate::output::MessageOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum WorkerError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required setting was not provided.
    #[error("Missing required setting '{name}'")]
    MissingSetting { name: &'static str },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// No usable headless Chromium executable.
    #[error(
        "Headless Chromium is unavailable: {0}\n\n\
Set CHROMIUM_PATH to an existing binary, or CHROMIUM_ARCHIVE / CHROMIUM_ARCHIVE_URL\n\
to a .tar.gz that contains one.\n"
    )]
    ChromiumUnavailable(String),

    // ── Batch errors ──────────────────────────────────────────────────────
    /// At least one message in the batch failed; the trigger must see a
    /// failure so the platform considers the batch for redelivery.
    #[error("{failed}/{total} messages failed in batch\nFirst error: {first_error}")]
    BatchFailed {
        failed: usize,
        total: usize,
        first_error: String,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure confined to a single message's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum MessageError {
    /// Browser failed to launch, load the document, or produce a PDF.
    #[error("Render engine failed: {detail}")]
    RenderEngine { detail: String },

    /// Input object does not exist.
    #[error("Object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// The worker's principal may not read or write the object.
    #[error("Access denied: s3://{bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    /// Object storage could not complete the request.
    #[error("Storage unavailable for s3://{bucket}/{key}: {detail}")]
    StorageUnavailable {
        bucket: String,
        key: String,
        detail: String,
    },

    /// Receipt handle is stale (message redelivered or already deleted).
    #[error("Invalid receipt handle: {detail}")]
    InvalidReceiptHandle { detail: String },

    /// The queue service could not delete the message.
    #[error("Queue unavailable: {detail}")]
    QueueUnavailable { detail: String },

    /// Payload missing or with an invalid `content` field.
    #[error("Malformed message body: {detail}")]
    MalformedMessageBody { detail: String },

    /// The invocation deadline fired while the pipeline was still running.
    #[error("Deadline exceeded while {stage}")]
    DeadlineExceeded { stage: Stage },
}

impl MessageError {
    /// Whether queue redelivery can plausibly fix this failure.
    ///
    /// Malformed bodies and access errors need a human; everything else is
    /// worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            MessageError::MalformedMessageBody { .. } | MessageError::AccessDenied { .. }
        )
    }
}
