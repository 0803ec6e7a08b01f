//! Lambda entry point for SQS-triggered invocations.

use crate::batch::BatchProcessor;
use crate::output::BatchReport;
use crate::pipeline::input::QueueMessage;
use aws_lambda_events::event::sqs::{SqsBatchResponse, SqsEvent};
use lambda_runtime::LambdaEvent;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Handle one SQS batch.
///
/// Returns `Err` when any message failed, so the platform treats the batch as
/// failed; successful messages were already deleted and are not redelivered.
/// With `report_item_failures` the failed ids are returned instead, for
/// functions whose event source mapping enables `ReportBatchItemFailures`.
pub async fn handle_sqs_event(
    processor: Arc<BatchProcessor>,
    event: LambdaEvent<SqsEvent>,
) -> Result<SqsBatchResponse, lambda_runtime::Error> {
    let (event, context) = event.into_parts();
    let messages: Vec<QueueMessage> = event.records.into_iter().map(QueueMessage::from).collect();
    info!(
        request_id = %context.request_id,
        "Received {} record(s)",
        messages.len()
    );

    let config = processor.config();
    let report = match batch_deadline(context.deadline, SystemTime::now(), config.deadline_margin()) {
        Some(remaining) => {
            debug!("Batch budget: {}ms", remaining.as_millis());
            processor
                .process_batch_until(messages, tokio::time::Instant::now() + remaining)
                .await
        }
        None => {
            warn!("Invocation has no deadline; waiting for every pipeline");
            processor.process_batch(messages).await
        }
    };

    respond(report, config.report_item_failures)
}

/// Turn a batch report into the invocation result.
pub fn respond(
    report: BatchReport,
    report_item_failures: bool,
) -> Result<SqsBatchResponse, lambda_runtime::Error> {
    if let Ok(stats) = serde_json::to_string(&report.stats) {
        debug!("Batch stats: {stats}");
    }
    if report_item_failures {
        return Ok(report.batch_item_failures());
    }
    report
        .into_result()
        .map(|_| SqsBatchResponse::default())
        .map_err(lambda_runtime::Error::from)
}

/// Time left for pipelines: `deadline_ms` (epoch millis) minus `now` minus
/// `margin`, floored at zero.
///
/// `None` when the context carries no deadline.
pub fn batch_deadline(deadline_ms: u64, now: SystemTime, margin: Duration) -> Option<Duration> {
    if deadline_ms == 0 {
        return None;
    }
    let now_ms = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let remaining = deadline_ms.saturating_sub(now_ms);
    Some(Duration::from_millis(remaining).saturating_sub(margin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessageError;
    use crate::output::{MessageOutcome, Stage};

    fn at(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(ms)
    }

    fn outcome(id: &str, ok: bool) -> MessageOutcome {
        MessageOutcome {
            message_id: id.to_string(),
            stage: if ok { Stage::Done } else { Stage::Failed },
            failed_at: (!ok).then_some(Stage::Rendering),
            output_key: None,
            signed_url: None,
            acknowledged: ok,
            duration_ms: 0,
            error: (!ok).then(|| MessageError::RenderEngine {
                detail: "crash".into(),
            }),
        }
    }

    #[test]
    fn deadline_subtracts_margin() {
        let d = batch_deadline(1_000_030_000, at(1_000_000_000), Duration::from_millis(1500));
        assert_eq!(d, Some(Duration::from_millis(28_500)));
    }

    #[test]
    fn deadline_floors_at_zero() {
        let d = batch_deadline(1_000_001_000, at(1_000_000_000), Duration::from_millis(1500));
        assert_eq!(d, Some(Duration::ZERO));
        let past = batch_deadline(5, at(1_000_000_000), Duration::ZERO);
        assert_eq!(past, Some(Duration::ZERO));
    }

    #[test]
    fn missing_deadline() {
        assert_eq!(batch_deadline(0, SystemTime::now(), Duration::ZERO), None);
    }

    #[test]
    fn all_success_is_ok_and_empty() {
        let report = BatchReport::from_outcomes(vec![outcome("a", true)], 0);
        let resp = respond(report, false).unwrap();
        assert!(resp.batch_item_failures.is_empty());
    }

    #[test]
    fn any_failure_fails_the_invocation() {
        let report = BatchReport::from_outcomes(vec![outcome("a", true), outcome("b", false)], 0);
        let err = respond(report, false).unwrap_err();
        assert!(err.to_string().contains("1/2"), "got: {err}");
    }

    #[test]
    fn item_failures_mode_names_failed_ids() {
        let report = BatchReport::from_outcomes(vec![outcome("a", true), outcome("b", false)], 0);
        let resp = respond(report, true).unwrap();
        assert_eq!(resp.batch_item_failures.len(), 1);
        assert_eq!(resp.batch_item_failures[0].item_identifier, "b");
    }
}
