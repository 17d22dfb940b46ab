// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler error taxonomy.
//!
//! A closed sum over everything that can go wrong while handling one
//! delivery. Adapter errors arrive already classified; this type only
//! carries the classification to the final [`JobOutcome`], it never
//! re-classifies.

use crate::validate::ValidationError;
use tally_core::classify::ErrorCategory;
use tally_core::{JobOutcome, StepName};
use tally_adapters::{MetadataError, StateStoreError, StorageError};
use thiserror::Error;

/// Errors that can occur while handling a delivered job.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    StateStore(#[from] StateStoreError),
    #[error("pipeline step {step} failed: {message}")]
    Pipeline {
        step: StepName,
        message: String,
        transient: bool,
    },
    #[error("lock lost during processing")]
    LockLost,
    #[error("corrupt pipeline state: {0}")]
    Corrupt(String),
    #[error("shutting down")]
    Cancelled,
}

impl HandlerError {
    /// Whether a redelivery can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HandlerError::Validation(_) => false,
            HandlerError::Storage(e) => e.is_transient(),
            HandlerError::Metadata(e) => e.transient,
            HandlerError::StateStore(e) => e.transient,
            HandlerError::Pipeline { transient, .. } => *transient,
            HandlerError::LockLost => true,
            HandlerError::Corrupt(_) => false,
            HandlerError::Cancelled => true,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            HandlerError::Validation(_) => ErrorCategory::Validation,
            HandlerError::Storage(_)
            | HandlerError::Metadata(_)
            | HandlerError::StateStore(_) => ErrorCategory::Infrastructure,
            HandlerError::Pipeline { .. } => ErrorCategory::Pipeline,
            HandlerError::LockLost | HandlerError::Cancelled => ErrorCategory::Concurrency,
            HandlerError::Corrupt(_) => ErrorCategory::Unknown,
        }
    }

    /// Collapse into the queue-facing outcome.
    pub fn into_outcome(self) -> JobOutcome {
        let message = self.to_string();
        if self.is_transient() {
            JobOutcome::transient(message)
        } else {
            JobOutcome::permanent(message)
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
