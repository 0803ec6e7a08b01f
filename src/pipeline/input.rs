//! Ingress: turn a trigger record into a validated render request.
//!
//! Everything a message needs is checked here, before the pipeline touches
//! the network. A record that cannot be acknowledged (no receipt handle) or
//! whose body does not name an input document fails fast with
//! [`MessageError::MalformedMessageBody`] instead of carrying an undefined
//! value into storage keys.

use crate::error::MessageError;
use aws_lambda_events::event::sqs::SqsMessage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Id used for records that arrive without a `messageId`.
pub const UNKNOWN_MESSAGE_ID: &str = "<unknown>";

/// One queue message as delivered by the trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub body: String,
    pub receipt_handle: String,
}

/// Message body schema: `{"content": "<document name>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPayload {
    pub content: String,
}

impl QueueMessage {
    pub fn new(
        id: impl Into<String>,
        body: impl Into<String>,
        receipt_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            receipt_handle: receipt_handle.into(),
        }
    }

    /// Check the record can be processed and acknowledged, and decode its body.
    pub fn validate(&self) -> Result<RenderPayload, MessageError> {
        if self.id.is_empty() || self.id == UNKNOWN_MESSAGE_ID {
            return Err(malformed("record has no messageId"));
        }
        if self.receipt_handle.is_empty() {
            return Err(malformed("record has no receiptHandle"));
        }
        let payload = parse_payload(&self.body)?;
        debug!(message_id = %self.id, content = %payload.content, "Validated message");
        Ok(payload)
    }
}

impl From<SqsMessage> for QueueMessage {
    fn from(record: SqsMessage) -> Self {
        Self {
            id: record
                .message_id
                .unwrap_or_else(|| UNKNOWN_MESSAGE_ID.to_string()),
            body: record.body.unwrap_or_default(),
            receipt_handle: record.receipt_handle.unwrap_or_default(),
        }
    }
}

/// Decode and validate a message body.
///
/// `content` must be a non-blank string with no leading `/`, no `..`
/// segment and no control characters. S3 keys are flat, so `in/a/../b.html`
/// would not actually leave the prefix; these checks are a key-hygiene
/// policy that rejects producer mistakes early, and are stricter than the
/// message format itself requires.
pub fn parse_payload(body: &str) -> Result<RenderPayload, MessageError> {
    let payload: RenderPayload =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON body: {e}")))?;

    let content = payload.content.as_str();
    if content.trim().is_empty() {
        return Err(malformed("`content` is empty"));
    }
    if content.starts_with('/') {
        return Err(malformed(format!("`content` must be relative, got '{content}'")));
    }
    if content.split('/').any(|seg| seg == "..") {
        return Err(malformed(format!(
            "`content` must not contain '..' segments, got '{content}'"
        )));
    }
    if content.chars().any(char::is_control) {
        return Err(malformed("`content` contains control characters"));
    }

    Ok(payload)
}

fn malformed(detail: impl Into<String>) -> MessageError {
    MessageError::MalformedMessageBody {
        detail: detail.into(),
    }
}
