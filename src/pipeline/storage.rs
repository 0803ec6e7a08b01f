//! Object storage: fetch inputs, store PDFs, mint signed download URLs.
//!
//! [`S3ObjectStore`] is the production store. It wraps one `aws_sdk_s3`
//! client built from the process-wide SDK config; the client is cheap to
//! clone and safe to share across every concurrent pipeline.
//!
//! Service failures are mapped onto [`MessageError`] by
//! [`classify_storage_error`], which only looks at the error code and HTTP
//! status so the mapping can be tested without a network.

use crate::error::MessageError;
use crate::output::SignedUrl;
use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Read, write and sign objects in a bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Full contents of `bucket/key`.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, MessageError>;

    /// Write `bytes` to `bucket/key`, replacing any existing object.
    async fn store(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), MessageError>;

    /// A GET link for `bucket/key` valid for `ttl`.
    ///
    /// Does not check that the object exists.
    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, MessageError>;
}

// ── S3 ───────────────────────────────────────────────────────────────────

/// [`ObjectStore`] backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
        }
    }

    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, MessageError> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| from_sdk_error(&e, bucket, key))?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| MessageError::StorageUnavailable {
                bucket: bucket.to_string(),
                key: key.to_string(),
                detail: format!("body stream failed: {e}"),
            })?;
        let bytes = body.into_bytes().to_vec();
        debug!("Fetched s3://{bucket}/{key} ({} bytes)", bytes.len());
        Ok(bytes)
    }

    async fn store(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), MessageError> {
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| from_sdk_error(&e, bucket, key))?;
        debug!("Stored s3://{bucket}/{key} ({len} bytes, {content_type})");
        Ok(())
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, MessageError> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| MessageError::StorageUnavailable {
                bucket: bucket.to_string(),
                key: key.to_string(),
                detail: format!("invalid signing window {}s: {e}", ttl.as_secs()),
            })?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| from_sdk_error(&e, bucket, key))?;

        Ok(SignedUrl::issued_now(request.uri(), ttl))
    }
}

fn from_sdk_error<E>(err: &SdkError<E>, bucket: &str, key: &str) -> MessageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    classify_storage_error(
        err.code(),
        status,
        bucket,
        key,
        DisplayErrorContext(err).to_string(),
    )
}

/// Map a storage service failure to a [`MessageError`].
///
/// * `NoSuchKey` / `NotFound` / 404 → [`MessageError::ObjectNotFound`]
/// * `AccessDenied` / 403 → [`MessageError::AccessDenied`]
/// * anything else, including transport errors with no response →
///   [`MessageError::StorageUnavailable`]
pub fn classify_storage_error(
    code: Option<&str>,
    status: Option<u16>,
    bucket: &str,
    key: &str,
    detail: impl Into<String>,
) -> MessageError {
    let bucket = bucket.to_string();
    let key = key.to_string();
    match (code, status) {
        (Some("NoSuchKey" | "NotFound"), _) | (_, Some(404)) => {
            MessageError::ObjectNotFound { bucket, key }
        }
        (Some("AccessDenied"), _) | (_, Some(403)) => MessageError::AccessDenied { bucket, key },
        _ => MessageError::StorageUnavailable {
            bucket,
            key,
            detail: detail.into(),
        },
    }
}

// ── In-memory ────────────────────────────────────────────────────────────

/// An object held by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// [`ObjectStore`] kept in process memory.
///
/// Signed URLs use the `memory://` scheme and carry the TTL as
/// `X-Amz-Expires` so callers can inspect it like a real presigned URL.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    fail_writes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without a content type.
    pub fn insert(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: bytes.into(),
                content_type: None,
            },
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.lock()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Keys currently stored under `prefix` in `bucket`, sorted.
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Make every subsequent `store` fail with `StorageUnavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), StoredObject>> {
        // A poisoned map is still consistent: every write is a single insert.
        self.objects.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, MessageError> {
        self.get(bucket, key)
            .map(|o| o.bytes)
            .ok_or_else(|| MessageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn store(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), MessageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MessageError::StorageUnavailable {
                bucket: bucket.to_string(),
                key: key.to_string(),
                detail: "writes disabled".to_string(),
            });
        }
        self.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, MessageError> {
        let url = format!("memory://{bucket}/{key}?X-Amz-Expires={}", ttl.as_secs());
        Ok(SignedUrl::issued_now(url, ttl))
    }
}
