// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler outcome and its queue-action mapping.
//!
//! This is the only contract between the job handler and the queue
//! adapter: ok and permanent outcomes ack (a permanent failure has
//! already been recorded on the metadata record), transient outcomes
//! nack so the queue redelivers.

use std::fmt;

/// How an ok outcome was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// The pipeline ran (or resumed) and the artifact was published.
    Completed,
    /// Artifact and metadata already final; nothing to do.
    IdempotentSkip,
    /// Another holder owns the lock; not an error.
    SkippedBusy,
    /// A live run exists (fresh running state); not an error.
    SkippedLive,
}

impl fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionKind::Completed => write!(f, "completed"),
            CompletionKind::IdempotentSkip => write!(f, "idempotent-skip"),
            CompletionKind::SkippedBusy => write!(f, "skipped-busy"),
            CompletionKind::SkippedLive => write!(f, "skipped-live"),
        }
    }
}

/// Terminal outcome of handling one delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Ok(CompletionKind),
    Transient { message: String },
    Permanent { message: String },
}

/// What the queue adapter does with a handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    Ack,
    Nack,
}

impl JobOutcome {
    pub fn transient(message: impl Into<String>) -> Self {
        JobOutcome::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        JobOutcome::Permanent {
            message: message.into(),
        }
    }

    /// The queue action this outcome maps to.
    pub fn queue_action(&self) -> QueueAction {
        match self {
            JobOutcome::Ok(_) | JobOutcome::Permanent { .. } => QueueAction::Ack,
            JobOutcome::Transient { .. } => QueueAction::Nack,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, JobOutcome::Ok(_))
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Ok(kind) => write!(f, "ok ({kind})"),
            JobOutcome::Transient { message } => write!(f, "transient: {message}"),
            JobOutcome::Permanent { message } => write!(f, "permanent: {message}"),
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
