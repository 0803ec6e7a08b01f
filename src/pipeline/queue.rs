//! Queue acknowledgment: delete a processed message by its receipt handle.

use crate::error::MessageError;
use async_trait::async_trait;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Removes messages from the queue they were delivered from.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn acknowledge(&self, queue: &str, receipt_handle: &str) -> Result<(), MessageError>;
}

/// [`MessageQueue`] backed by Amazon SQS `DeleteMessage`.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
}

impl SqsQueue {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_sqs::Client::new(sdk_config),
        }
    }

    pub fn from_client(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn acknowledge(&self, queue: &str, receipt_handle: &str) -> Result<(), MessageError> {
        self.client
            .delete_message()
            .queue_url(queue)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| classify_queue_error(e.code(), DisplayErrorContext(&e).to_string()))?;
        debug!("Deleted message from {queue}");
        Ok(())
    }
}

/// Map a `DeleteMessage` failure to a [`MessageError`].
///
/// Stale or garbled handles become [`MessageError::InvalidReceiptHandle`];
/// every other failure means the message is still on the queue and becomes
/// [`MessageError::QueueUnavailable`]. Codes may arrive namespaced
/// (`AWS.SimpleQueueService.ReceiptHandleIsInvalid`), so only the last
/// segment is compared.
pub fn classify_queue_error(code: Option<&str>, detail: impl Into<String>) -> MessageError {
    let name = code.and_then(|c| c.rsplit('.').next());
    match name {
        Some("ReceiptHandleIsInvalid" | "InvalidIdFormat") => MessageError::InvalidReceiptHandle {
            detail: detail.into(),
        },
        _ => MessageError::QueueUnavailable {
            detail: detail.into(),
        },
    }
}

/// [`MessageQueue`] kept in process memory.
///
/// Holds the set of live receipt handles; acknowledging a handle that is not
/// live fails the way SQS does for a stale handle.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    live: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handles<I, S>(handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = Self::default();
        for h in handles {
            queue.add_handle(h);
        }
        queue
    }

    pub fn add_handle(&self, handle: impl Into<String>) {
        self.live
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(handle.into());
    }

    /// Handles deleted so far, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn is_live(&self, handle: &str) -> bool {
        self.live
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(handle)
    }

    /// Make every subsequent acknowledgment fail with `QueueUnavailable`.
    pub fn set_unavailable(&self, v: bool) {
        self.unavailable.store(v, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn acknowledge(&self, queue: &str, receipt_handle: &str) -> Result<(), MessageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MessageError::QueueUnavailable {
                detail: format!("{queue} is unavailable"),
            });
        }
        let removed = self
            .live
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(receipt_handle);
        if !removed {
            return Err(MessageError::InvalidReceiptHandle {
                detail: format!("receipt handle '{receipt_handle}' is not live"),
            });
        }
        self.deleted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(receipt_handle.to_string());
        Ok(())
    }
}
