//! Wiring of the production collaborators.
//!
//! The SDK config, S3 and SQS clients and the Chromium renderer are built
//! once per process (cold start) and shared by every invocation after that.

use crate::batch::BatchProcessor;
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::pipeline::queue::SqsQueue;
use crate::pipeline::render::ChromiumRenderer;
use crate::pipeline::storage::S3ObjectStore;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;
use tracing::info;

/// Load AWS settings from the environment, optionally pinning the region.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

/// Build a processor backed by S3, SQS and headless Chromium.
///
/// Chromium resolution may unpack an archive, so it runs on the blocking
/// pool.
pub async fn build_processor(config: WorkerConfig) -> Result<BatchProcessor, WorkerError> {
    let sdk_config = load_sdk_config(config.region.as_deref()).await;
    info!(
        "AWS region: {}",
        sdk_config
            .region()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(unset)".to_string())
    );

    let render_config = config.clone();
    let renderer = tokio::task::spawn_blocking(move || ChromiumRenderer::from_config(&render_config))
        .await
        .map_err(|e| WorkerError::Internal(format!("Chromium setup task failed: {e}")))??;

    Ok(BatchProcessor::new(
        Arc::new(renderer),
        Arc::new(S3ObjectStore::new(&sdk_config)),
        Arc::new(SqsQueue::new(&sdk_config)),
        config,
    ))
}
