//! Batch processing: drive every queue message through its pipeline.
//!
//! ## Per-message pipeline
//!
//! ```text
//! Received ─▶ Fetching ─▶ Rendering ─▶ Storing ─▶ Signing ─▶ Acknowledging ─▶ Done
//!     │           │            │           │          │             │
//!     └───────────┴────────────┴───────────┴──────────┴─────────────┴──▶ Failed
//! ```
//!
//! Stages run strictly in order and nothing is retried inside an invocation:
//! the first error moves the message to `Failed` and it stays on the queue,
//! so the platform's redelivery is the retry. A stale receipt handle during
//! `Acknowledging` is the one exception. The PDF is already stored, so the
//! message still counts as `Done`, just unacknowledged.
//!
//! ## Fan-out
//!
//! Messages of one batch run concurrently, bounded by
//! [`WorkerConfig::concurrency`]. One message failing never cancels or
//! delays its siblings. Every pipeline is awaited before the batch settles.

use crate::config::{WorkerConfig, PDF_CONTENT_TYPE};
use crate::error::MessageError;
use crate::output::{BatchReport, MessageOutcome, Stage};
use crate::pipeline::input::QueueMessage;
use crate::pipeline::queue::MessageQueue;
use crate::pipeline::render::RenderEngine;
use crate::pipeline::storage::ObjectStore;
use crate::progress::Observer;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Runs queue messages through fetch → render → store → sign → acknowledge.
///
/// Holds only shared, immutable collaborators, so one processor serves every
/// invocation of a warm container.
pub struct BatchProcessor {
    renderer: Arc<dyn RenderEngine>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn MessageQueue>,
    config: Arc<WorkerConfig>,
}

impl BatchProcessor {
    pub fn new(
        renderer: Arc<dyn RenderEngine>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn MessageQueue>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            renderer,
            store,
            queue,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one message's pipeline to completion.
    pub async fn process_message(&self, msg: &QueueMessage) -> MessageOutcome {
        self.process_one(msg, None).await
    }

    /// Process every message concurrently and wait for all of them.
    ///
    /// At most [`WorkerConfig::concurrency`] pipelines run at once; a larger
    /// batch queues the rest behind them. Outcomes are returned in the order of `messages`.
    pub async fn process_batch(&self, messages: Vec<QueueMessage>) -> BatchReport {
        self.run_batch(messages, None).await
    }

    /// Like [`process_batch`](Self::process_batch), but stop waiting at
    /// `deadline`.
    ///
    /// A pipeline still running at the deadline is dropped, which releases
    /// its browser session, and is reported as
    /// [`MessageError::DeadlineExceeded`] at the stage it had reached. It is
    /// never acknowledged.
    pub async fn process_batch_until(
        &self,
        messages: Vec<QueueMessage>,
        deadline: tokio::time::Instant,
    ) -> BatchReport {
        self.run_batch(messages, Some(deadline)).await
    }

    async fn run_batch(
        &self,
        messages: Vec<QueueMessage>,
        deadline: Option<tokio::time::Instant>,
    ) -> BatchReport {
        let start = Instant::now();
        let total = messages.len();
        info!(
            "Processing batch of {} message(s), concurrency {}",
            total, self.config.concurrency
        );
        if let Some(ref obs) = self.config.observer {
            obs.on_batch_start(total);
        }

        let mut indexed: Vec<(usize, MessageOutcome)> =
            stream::iter(messages.iter().enumerate().map(|(i, msg)| async move {
                (i, self.process_one(msg, deadline).await)
            }))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        let outcomes = indexed.into_iter().map(|(_, o)| o).collect();

        let report = BatchReport::from_outcomes(outcomes, start.elapsed().as_millis() as u64);
        if let Some(ref obs) = self.config.observer {
            obs.on_batch_complete(total, report.stats.succeeded);
        }
        info!(
            "Batch complete: {}/{} succeeded, {} unacknowledged, {}ms",
            report.stats.succeeded,
            report.stats.total,
            report.stats.unacknowledged,
            report.stats.duration_ms
        );
        report
    }

    async fn process_one(
        &self,
        msg: &QueueMessage,
        deadline: Option<tokio::time::Instant>,
    ) -> MessageOutcome {
        let start = Instant::now();
        let tracker = StageTracker::new(&msg.id, self.config.observer.clone());
        let span = info_span!("message", message_id = %msg.id);
        let pipeline = self.run(msg, &tracker, start);

        match deadline {
            None => pipeline.instrument(span).await,
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, pipeline)
                    .instrument(span.clone())
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => span.in_scope(|| self.deadline_outcome(msg, &tracker, start)),
                }
            }
        }
    }

    async fn run(&self, msg: &QueueMessage, tracker: &StageTracker, start: Instant) -> MessageOutcome {
        let mut outcome = MessageOutcome {
            message_id: msg.id.clone(),
            stage: Stage::Received,
            failed_at: None,
            output_key: None,
            signed_url: None,
            acknowledged: false,
            duration_ms: 0,
            error: None,
        };

        match self.drive(msg, tracker, &mut outcome).await {
            Ok(()) => {
                outcome.stage = Stage::Done;
                if let Some(ref obs) = self.config.observer {
                    obs.on_message_complete(&msg.id, outcome.output_key.as_deref().unwrap_or(""));
                }
            }
            Err(e) => {
                let at = tracker.current();
                error!(
                    message_id = %msg.id,
                    stage = %at,
                    retryable = e.is_retryable(),
                    "Message failed: {e}"
                );
                if let Some(ref obs) = self.config.observer {
                    obs.on_message_error(&msg.id, at, &e.to_string());
                }
                outcome.stage = Stage::Failed;
                outcome.failed_at = Some(at);
                outcome.error = Some(e);
            }
        }
        outcome.duration_ms = start.elapsed().as_millis() as u64;
        outcome
    }

    async fn drive(
        &self,
        msg: &QueueMessage,
        tracker: &StageTracker,
        outcome: &mut MessageOutcome,
    ) -> Result<(), MessageError> {
        let cfg = &*self.config;
        tracker.enter(Stage::Received);
        let payload = msg.validate()?;

        tracker.enter(Stage::Fetching);
        let input_key = cfg.input_key(&payload.content);
        let html = self.store.fetch(&cfg.bucket, &input_key).await?;
        let html = String::from_utf8_lossy(&html);

        tracker.enter(Stage::Rendering);
        let pdf = self.renderer.render(&html).await?;

        tracker.enter(Stage::Storing);
        let output_key = cfg.output_key(&msg.id);
        self.store
            .store(&cfg.bucket, &output_key, pdf, PDF_CONTENT_TYPE)
            .await?;
        outcome.output_key = Some(output_key.clone());

        tracker.enter(Stage::Signing);
        let signed = self
            .store
            .signed_url(&cfg.bucket, &output_key, cfg.url_ttl())
            .await?;
        info!(
            message_id = %msg.id,
            output_key = %output_key,
            expires_at = %signed.expires_at,
            "PDF ready: {}",
            signed.url
        );
        outcome.signed_url = Some(signed);

        tracker.enter(Stage::Acknowledging);
        match self
            .queue
            .acknowledge(&cfg.queue_url, &msg.receipt_handle)
            .await
        {
            Ok(()) => outcome.acknowledged = true,
            Err(MessageError::InvalidReceiptHandle { detail }) => {
                warn!(
                    message_id = %msg.id,
                    "PDF stored but message not deleted (stale receipt handle): {detail}"
                );
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn deadline_outcome(
        &self,
        msg: &QueueMessage,
        tracker: &StageTracker,
        start: Instant,
    ) -> MessageOutcome {
        let at = tracker.current();
        let err = MessageError::DeadlineExceeded { stage: at };
        error!(message_id = %msg.id, stage = %at, "Message abandoned: {err}");
        if let Some(ref obs) = self.config.observer {
            obs.on_message_error(&msg.id, at, &err.to_string());
        }
        // The store finished if the pipeline got past it.
        let output_key = (at as u8 > Stage::Storing as u8).then(|| self.config.output_key(&msg.id));
        MessageOutcome {
            message_id: msg.id.clone(),
            stage: Stage::Failed,
            failed_at: Some(at),
            output_key,
            signed_url: None,
            acknowledged: false,
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(err),
        }
    }
}

/// Current stage of one pipeline, readable after its future is dropped.
struct StageTracker {
    message_id: String,
    stage: AtomicU8,
    observer: Option<Observer>,
}

impl StageTracker {
    fn new(message_id: &str, observer: Option<Observer>) -> Self {
        Self {
            message_id: message_id.to_string(),
            stage: AtomicU8::new(Stage::Received as u8),
            observer,
        }
    }

    fn enter(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::SeqCst);
        debug!("→ {stage}");
        if let Some(ref obs) = self.observer {
            obs.on_stage(&self.message_id, stage);
        }
    }

    fn current(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::SeqCst)).unwrap_or(Stage::Received)
    }
}
