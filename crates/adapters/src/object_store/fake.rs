// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake bucket backend for testing

use super::{BucketOps, StorageError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct FakeBucketState {
    objects: HashMap<String, (Vec<u8>, String)>,
    /// Injected failures keyed by (op, key-prefix); consumed on match.
    failures: Vec<(FakeOp, String, StorageError)>,
    /// Report a wrong size on the next head of a matching key.
    corrupt_next_put: bool,
    put_count: u64,
}

/// Bucket operations that can have failures injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeOp {
    Put,
    Head,
    Copy,
    Delete,
    Probe,
}

/// In-memory [`BucketOps`] with fault injection.
#[derive(Clone, Default)]
pub struct FakeBucket {
    inner: Arc<Mutex<FakeBucketState>>,
}

impl FakeBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for the next matching `op` on a key starting
    /// with `key_prefix`.
    pub fn fail_next(&self, op: FakeOp, key_prefix: &str, error: StorageError) {
        self.inner
            .lock()
            .failures
            .push((op, key_prefix.to_string(), error));
    }

    /// Make the next put store truncated bytes, so size verification
    /// fails on the subsequent head.
    pub fn corrupt_next_put(&self) {
        self.inner.lock().corrupt_next_put = true;
    }

    /// Raw object bytes at `key`, if present.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().objects.get(key).map(|(b, _)| b.clone())
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of put operations performed.
    pub fn put_count(&self) -> u64 {
        self.inner.lock().put_count
    }

    /// Seed an object directly at `key`.
    pub fn seed(&self, key: &str, bytes: &[u8]) {
        self.inner.lock().objects.insert(
            key.to_string(),
            (bytes.to_vec(), "application/json".to_string()),
        );
    }

    fn take_failure(&self, op: FakeOp, key: &str) -> Option<StorageError> {
        let mut state = self.inner.lock();
        let index = state
            .failures
            .iter()
            .position(|(o, prefix, _)| *o == op && key.starts_with(prefix.as_str()))?;
        Some(state.failures.remove(index).2)
    }
}

#[async_trait]
impl BucketOps for FakeBucket {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        if let Some(err) = self.take_failure(FakeOp::Put, key) {
            return Err(err);
        }
        let mut state = self.inner.lock();
        state.put_count += 1;
        let stored = if state.corrupt_next_put {
            state.corrupt_next_put = false;
            bytes[..bytes.len() / 2].to_vec()
        } else {
            bytes.to_vec()
        };
        state
            .objects
            .insert(key.to_string(), (stored, content_type.to_string()));
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<u64>, StorageError> {
        if let Some(err) = self.take_failure(FakeOp::Head, key) {
            return Err(err);
        }
        Ok(self
            .inner
            .lock()
            .objects
            .get(key)
            .map(|(b, _)| b.len() as u64))
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        if let Some(err) = self.take_failure(FakeOp::Copy, dst) {
            return Err(err);
        }
        let mut state = self.inner.lock();
        let object = state
            .objects
            .get(src)
            .cloned()
            .ok_or_else(|| StorageError::not_found(format!("no such object: {src}")))?;
        state.objects.insert(dst.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if let Some(err) = self.take_failure(FakeOp::Delete, key) {
            return Err(err);
        }
        match self.inner.lock().objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(format!("no such object: {key}"))),
        }
    }

    async fn probe(&self) -> Result<(), StorageError> {
        if let Some(err) = self.take_failure(FakeOp::Probe, "") {
            return Err(err);
        }
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("gs://fake-bucket/{key}")
    }
}
