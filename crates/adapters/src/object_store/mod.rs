// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object bucket adapter with atomic publish.
//!
//! The contract readers rely on: the final key either does not exist or
//! holds a fully written, size-verified object. [`BucketStore`] enforces
//! this by writing under a unique temp key, verifying the stored size
//! against the payload via a metadata fetch, and only then performing a
//! server-side move to the final key. A failed verification deletes the
//! temp object and never touches the final key.
//!
//! All raw bucket I/O goes through the [`BucketOps`] trait so the same
//! protocol runs against the production GCS bucket and the fault-
//! injecting fake in tests.

mod gcs;

pub use gcs::GcsBucket;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBucket, FakeOp};
#[cfg(any(test, feature = "test-support"))]
pub type FakeObjectStore = BucketStore<FakeBucket>;

use async_trait::async_trait;
use thiserror::Error;

/// Closed error kinds surfaced by bucket operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    Permission,
    Transient,
    Permanent,
}

/// Classified bucket error.
#[derive(Debug, Clone, Error)]
#[error("storage error ({kind:?}): {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Permission, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Permanent, message)
    }

    /// Whether a retry can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        self.kind == StorageErrorKind::Transient
    }
}

/// Raw bucket operations, one backend per implementation.
#[async_trait]
pub trait BucketOps: Clone + Send + Sync + 'static {
    /// Upload `bytes` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Size in bytes of the object at `key`, or `None` if absent.
    async fn head(&self, key: &str) -> Result<Option<u64>, StorageError>;

    /// Server-side copy of `src` to `dst`.
    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError>;

    /// Delete the object at `key`. Deleting a missing key is `NotFound`.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Lightweight bucket-accessibility probe.
    async fn probe(&self) -> Result<(), StorageError>;

    /// Externally resolvable URL for `key`.
    fn url(&self, key: &str) -> String;
}

/// High-level object store contract used by the job handler.
#[async_trait]
pub trait ObjectStore: Clone + Send + Sync + 'static {
    /// Whether an object exists at `name`. Absence is not an error.
    async fn file_exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Atomically publish `bytes` at `name`; returns the object URL.
    async fn store_file(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Delete the object at `name`.
    async fn delete_file(&self, name: &str) -> Result<(), StorageError>;

    /// Startup probe for bucket accessibility.
    async fn health_check(&self) -> Result<(), StorageError>;
}

/// Unique temp key for an in-flight write of `name`.
///
/// A random UUID (not a timestamp) so concurrent writers of the same
/// final name can never collide on the temp object.
fn temp_key(name: &str) -> String {
    format!("{name}.tmp.{}", uuid::Uuid::new_v4())
}

/// Object store implementing the atomic temp+verify+move publish over
/// any [`BucketOps`] backend.
#[derive(Clone)]
pub struct BucketStore<B: BucketOps> {
    bucket: B,
}

impl<B: BucketOps> BucketStore<B> {
    pub fn new(bucket: B) -> Self {
        Self { bucket }
    }

    /// Access the underlying backend (used by tests for inspection).
    pub fn bucket(&self) -> &B {
        &self.bucket
    }
}

#[async_trait]
impl<B: BucketOps> ObjectStore for BucketStore<B> {
    async fn file_exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.bucket.head(name).await?.is_some())
    }

    async fn store_file(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let tmp = temp_key(name);

        // 1. Write under the temp key; nothing observable at `name` yet.
        self.bucket.put(&tmp, bytes, content_type).await?;

        // 2. Verify the stored size against the payload.
        let stored = self.bucket.head(&tmp).await?.ok_or_else(|| {
            StorageError::transient(format!("temp object {tmp} vanished before verification"))
        })?;
        let expected = bytes.len() as u64;
        if stored != expected {
            // Never move a verified-bad object to the final key.
            if let Err(e) = self.bucket.delete(&tmp).await {
                tracing::warn!(key = %tmp, error = %e, "failed to delete unverified temp object");
            }
            return Err(StorageError::permanent(format!(
                "size verification failed for {name}: wrote {expected} bytes, stored {stored}"
            )));
        }

        // 3. Server-side move to the final key.
        self.bucket.copy(&tmp, name).await?;

        // 4. Temp cleanup is best-effort; an orphaned temp is harmless.
        if let Err(e) = self.bucket.delete(&tmp).await {
            tracing::warn!(key = %tmp, error = %e, "failed to delete temp object after move");
        }

        Ok(self.bucket.url(name))
    }

    async fn delete_file(&self, name: &str) -> Result<(), StorageError> {
        self.bucket.delete(name).await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.bucket.probe().await
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
