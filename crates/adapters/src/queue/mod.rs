// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue adapter: at-least-once job delivery.
//!
//! The only contract with the handler is [`JobSink`]: the handler gets
//! the decoded message plus its [`DeliveryContext`] and returns a
//! [`JobOutcome`]; the adapter maps ok/permanent to ack and transient
//! to nack. Undecodable bodies are acked and logged (there is no report
//! to record a failure against).

mod pubsub;

pub use pubsub::PubsubQueue;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeQueue;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{JobMessage, JobOutcome};
use thiserror::Error;
use tokio::sync::Notify;

/// Queue adapter error (startup/subscription level).
#[derive(Debug, Error)]
#[error("queue error: {0}")]
pub struct QueueError(pub String);

/// Per-delivery context handed to the handler.
///
/// `message_id` is unique per delivery and doubles as the lock fencing
/// value.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub message_id: String,
    pub attributes: HashMap<String, String>,
}

impl DeliveryContext {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            attributes: HashMap::new(),
        }
    }
}

/// The handler side of the queue contract.
#[async_trait]
pub trait JobSink: Send + Sync + 'static {
    async fn handle(&self, job: JobMessage, delivery: DeliveryContext) -> JobOutcome;
}

/// Decode a message body into a [`JobMessage`].
pub fn decode_job(data: &[u8]) -> Result<JobMessage, serde_json::Error> {
    serde_json::from_slice(data)
}

struct InFlightState {
    active: AtomicUsize,
    idle: Notify,
}

/// Explicit tracking handle for in-flight messages.
///
/// Passed through queue adapter initialization so shutdown can wait for
/// the handlers still running.
#[derive(Clone)]
pub struct InFlight {
    state: Arc<InFlightState>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self {
            state: Arc::new(InFlightState {
                active: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track one message; the returned guard decrements on drop.
    pub fn begin(&self) -> InFlightGuard {
        self.state.active.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Number of messages currently being handled.
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Wait until no messages are in flight, up to `grace`.
    ///
    /// Returns true when fully drained, false on timeout.
    pub async fn drain(&self, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if self.active() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return self.active() == 0;
            }
            let wait = self.state.idle.notified();
            let _ = tokio::time::timeout(Duration::from_millis(50), wait).await;
        }
    }
}

/// RAII guard for one in-flight message.
pub struct InFlightGuard {
    state: Arc<InFlightState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.state.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
