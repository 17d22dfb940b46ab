// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Report metadata document store adapter.
//!
//! `modify` is a read-merge-write: the patch is applied to a freshly
//! read record so fields absent from the update are never clobbered.

mod firestore;

pub use firestore::FirestoreMetadata;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMetadataStore;

use async_trait::async_trait;
use tally_core::{ReportId, ReportMetadata, ReportPatch};
use thiserror::Error;

/// Classified metadata store error.
#[derive(Debug, Clone, Error)]
#[error("metadata error [{}]: {message}", .code.as_deref().unwrap_or("unclassified"))]
pub struct MetadataError {
    /// Store-level string code, when the backend provided one.
    pub code: Option<String>,
    pub message: String,
    pub transient: bool,
}

impl MetadataError {
    pub fn new(code: Option<String>, message: impl Into<String>, transient: bool) -> Self {
        Self {
            code,
            message: message.into(),
            transient,
        }
    }

    /// Permanent not-found error for a missing record.
    pub fn not_found(id: &ReportId) -> Self {
        Self::new(
            Some("not-found".to_string()),
            format!("no metadata record for report {id}"),
            false,
        )
    }
}

/// Report metadata store contract.
#[async_trait]
pub trait MetadataStore: Clone + Send + Sync + 'static {
    /// Fetch the record for `id`, if present.
    async fn get(&self, id: &ReportId) -> Result<Option<ReportMetadata>, MetadataError>;

    /// Merge `patch` into the stored record and write it back.
    ///
    /// Returns the merged record. Fails with a permanent `not-found`
    /// when no record exists (the upstream producer creates it before
    /// enqueueing the job).
    async fn modify(
        &self,
        id: &ReportId,
        patch: ReportPatch,
    ) -> Result<ReportMetadata, MetadataError>;
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
