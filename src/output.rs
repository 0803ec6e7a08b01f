//! Result types produced by the batch processor.
//!
//! A batch yields one [`MessageOutcome`] per queue message, gathered into a
//! [`BatchReport`]. Outcomes are plain data so they can be logged as JSON or
//! handed to an embedding caller that wants the signed URLs.

use crate::error::{MessageError, WorkerError};
use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a message's pipeline is, or where it stopped.
///
/// Stages advance strictly in declaration order; `Failed` is absorbing and
/// reachable from every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    Received = 0,
    Fetching = 1,
    Rendering = 2,
    Storing = 3,
    Signing = 4,
    Acknowledging = 5,
    Done = 6,
    Failed = 7,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Fetching => "fetching",
            Stage::Rendering => "rendering",
            Stage::Storing => "storing",
            Stage::Signing => "signing",
            Stage::Acknowledging => "acknowledging",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    /// Inverse of `stage as u8`.
    pub fn from_u8(v: u8) -> Option<Stage> {
        Some(match v {
            0 => Stage::Received,
            1 => Stage::Fetching,
            2 => Stage::Rendering,
            3 => Stage::Storing,
            4 => Stage::Signing,
            5 => Stage::Acknowledging,
            6 => Stage::Done,
            7 => Stage::Failed,
            _ => return None,
        })
    }

    /// The stage that follows `self` on the success path.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Received => Some(Stage::Fetching),
            Stage::Fetching => Some(Stage::Rendering),
            Stage::Rendering => Some(Stage::Storing),
            Stage::Storing => Some(Stage::Signing),
            Stage::Signing => Some(Stage::Acknowledging),
            Stage::Acknowledging => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-limited download link for one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_in: Duration,
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    /// Build a URL record whose expiry is `expires_in` from now.
    pub fn issued_now(url: impl Into<String>, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(expires_in)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            url: url.into(),
            expires_in,
            expires_at,
        }
    }
}

/// Result of one message's pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOutcome {
    /// Queue message id (also names the output object).
    pub message_id: String,
    /// Terminal stage: `Done` or `Failed`.
    pub stage: Stage,
    /// For failures, the stage that was running when it failed.
    pub failed_at: Option<Stage>,
    /// Key of the stored PDF, once `Storing` succeeded.
    pub output_key: Option<String>,
    /// Download link, once `Signing` succeeded.
    pub signed_url: Option<SignedUrl>,
    /// Whether the queue entry was deleted.
    pub acknowledged: bool,
    /// Wall-clock time for this message (ms).
    pub duration_ms: u64,
    /// Error if the pipeline failed.
    pub error: Option<MessageError>,
}

impl MessageOutcome {
    pub fn is_success(&self) -> bool {
        self.stage == Stage::Done
    }
}

/// Aggregate numbers for a processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded but the queue entry could not be deleted (stale handle).
    pub unacknowledged: usize,
    pub duration_ms: u64,
}

/// Every message outcome of one invocation plus summary stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<MessageOutcome>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<MessageOutcome>, duration_ms: u64) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let unacknowledged = outcomes
            .iter()
            .filter(|o| o.is_success() && !o.acknowledged)
            .count();
        let stats = BatchStats {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            unacknowledged,
            duration_ms,
        };
        Self { outcomes, stats }
    }

    pub fn is_success(&self) -> bool {
        self.stats.failed == 0
    }

    /// Outcomes that ended in `Failed`.
    pub fn failures(&self) -> impl Iterator<Item = &MessageOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Look up the outcome for a message id.
    pub fn outcome(&self, message_id: &str) -> Option<&MessageOutcome> {
        self.outcomes.iter().find(|o| o.message_id == message_id)
    }

    /// Convert into `Err` when any message failed.
    pub fn into_result(self) -> Result<Self, WorkerError> {
        if self.is_success() {
            return Ok(self);
        }
        let first_error = self
            .failures()
            .find_map(|o| o.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        Err(WorkerError::BatchFailed {
            failed: self.stats.failed,
            total: self.stats.total,
            first_error,
        })
    }

    /// Partial-batch response naming every failed message.
    pub fn batch_item_failures(&self) -> SqsBatchResponse {
        let mut response = SqsBatchResponse::default();
        response.batch_item_failures = self
            .failures()
            .map(|o| {
                let mut item = BatchItemFailure::default();
                item.item_identifier = o.message_id.clone();
                item
            })
            .collect();
        response
    }
}
