//! Observer trait for per-message pipeline events.
//!
//! Inject an [`Arc<dyn ProcessingObserver>`] via
//! [`crate::config::WorkerConfigBuilder::observer`] to receive events as the
//! batch processor drives each message through its stages.
//!
//! Callers can forward events to metrics, a notification channel, or a test
//! recorder without the processor knowing how they are consumed. The trait
//! is `Send + Sync` because messages in a batch run concurrently.
//!
//! # Example
//!
//! ```rust
//! use html2pdf_worker::{ProcessingObserver, WorkerConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     done: AtomicUsize,
//! }
//!
//! impl ProcessingObserver for CountingObserver {
//!     fn on_message_complete(&self, message_id: &str, output_key: &str) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{message_id} -> {output_key}");
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { done: AtomicUsize::new(0) });
//!
//! let config = WorkerConfig::builder()
//!     .bucket("catalog")
//!     .queue_url("https://sqs.us-east-2.amazonaws.com/123/pdf")
//!     .observer(observer as Arc<dyn ProcessingObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Stage;
use std::sync::Arc;

/// Called by the batch processor as messages move through the pipeline.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about.
///
/// # Thread safety
///
/// Events for different messages arrive interleaved and possibly from
/// different worker threads. Events for one message arrive in stage order.
pub trait ProcessingObserver: Send + Sync {
    /// Called once before any message is processed.
    fn on_batch_start(&self, total_messages: usize) {
        let _ = total_messages;
    }

    /// Called each time a message enters a new non-terminal stage.
    fn on_stage(&self, message_id: &str, stage: Stage) {
        let _ = (message_id, stage);
    }

    /// Called when a message reaches `Done`.
    fn on_message_complete(&self, message_id: &str, output_key: &str) {
        let _ = (message_id, output_key);
    }

    /// Called when a message reaches `Failed`.
    ///
    /// * `failed_at` — the stage that was running
    /// * `error`     — human-readable error description
    fn on_message_error(&self, message_id: &str, failed_at: Stage, error: &str) {
        let _ = (message_id, failed_at, error);
    }

    /// Called once after every message has settled.
    fn on_batch_complete(&self, total_messages: usize, success_count: usize) {
        let _ = (total_messages, success_count);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl ProcessingObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::WorkerConfig`].
pub type Observer = Arc<dyn ProcessingObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<(String, Stage)>>,
        errors: Mutex<Vec<(String, Stage)>>,
    }

    impl ProcessingObserver for Recorder {
        fn on_stage(&self, message_id: &str, stage: Stage) {
            self.stages
                .lock()
                .unwrap()
                .push((message_id.to_string(), stage));
        }

        fn on_message_error(&self, message_id: &str, failed_at: Stage, _error: &str) {
            self.errors
                .lock()
                .unwrap()
                .push((message_id.to_string(), failed_at));
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_batch_start(2);
        obs.on_stage("m1", Stage::Fetching);
        obs.on_message_complete("m1", "out/m1.pdf");
        obs.on_message_error("m2", Stage::Rendering, "boom");
        obs.on_batch_complete(2, 1);
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let recorder = Arc::new(Recorder::default());
        let obs: Observer = recorder.clone();

        obs.on_stage("m1", Stage::Fetching);
        obs.on_stage("m1", Stage::Rendering);
        obs.on_message_error("m1", Stage::Rendering, "browser crashed");

        let stages = recorder.stages.lock().unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1], ("m1".to_string(), Stage::Rendering));
        assert_eq!(
            recorder.errors.lock().unwrap()[0],
            ("m1".to_string(), Stage::Rendering)
        );
    }
}
