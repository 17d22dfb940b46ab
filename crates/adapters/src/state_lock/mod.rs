// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpointed pipeline state and the distributed report lock.
//!
//! Two namespaces per report: `state:{id}` holds the JSON pipeline state,
//! `lock:{id}` holds the fencing value with a TTL. The fencing value is
//! the delivering message's id, unique per delivery; extend and release
//! are compare-and-mutate so a holder whose lease silently expired can
//! never extend or release a lease now owned by someone else.

mod redis;

pub use self::redis::RedisStateLock;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStateLock, StoreOp};

use async_trait::async_trait;
use std::time::Duration;
use tally_core::{PipelineState, ReportId};
use thiserror::Error;

/// State-store key for a report's pipeline state.
pub fn state_key(id: &ReportId) -> String {
    format!("state:{id}")
}

/// State-store key for a report's lock.
pub fn lock_key(id: &ReportId) -> String {
    format!("lock:{id}")
}

/// Classified state/lock store error.
#[derive(Debug, Clone, Error)]
#[error("state store error: {message}")]
pub struct StateStoreError {
    pub message: String,
    pub transient: bool,
}

impl StateStoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

/// State and lock store contract.
#[async_trait]
pub trait StateLockStore: Clone + Send + Sync + 'static {
    /// Read the pipeline state for `id`, if present.
    async fn get_state(&self, id: &ReportId) -> Result<Option<PipelineState>, StateStoreError>;

    /// Upsert the pipeline state. The store sets `updatedAt` (strictly
    /// advancing); the returned value is the timestamp written.
    async fn save_state(
        &self,
        id: &ReportId,
        state: &PipelineState,
    ) -> Result<u64, StateStoreError>;

    /// Acquire the report lock. Succeeds iff no live lock exists.
    async fn acquire_lock(
        &self,
        id: &ReportId,
        fencing: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError>;

    /// Whether the lock is currently held with `fencing`.
    async fn verify_lock(&self, id: &ReportId, fencing: &str) -> Result<bool, StateStoreError>;

    /// Extend the lease iff still held with `fencing`.
    async fn extend_lock(
        &self,
        id: &ReportId,
        fencing: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError>;

    /// Release the lease iff still held with `fencing`.
    ///
    /// A `false` return means the lease had already expired or been
    /// taken over; callers log it but never raise it as a job error.
    async fn release_lock(&self, id: &ReportId, fencing: &str) -> Result<bool, StateStoreError>;

    /// Startup connectivity probe.
    async fn ping(&self) -> Result<(), StateStoreError>;
}

#[cfg(test)]
#[path = "state_lock_tests.rs"]
mod tests;
