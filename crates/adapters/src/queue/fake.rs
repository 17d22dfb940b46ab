// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake at-least-once queue for testing.
//!
//! Nacked deliveries are re-queued with a fresh message id, mirroring
//! the at-least-once redelivery of the production queue.

use super::{decode_job, DeliveryContext, JobSink};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tally_core::{JobMessage, JobOutcome, QueueAction};
use tracing::error;

struct FakeQueueState {
    pending: VecDeque<(String, Vec<u8>)>,
    next_id: u64,
    deliveries: Vec<(String, JobOutcome)>,
}

/// In-memory queue that drives a [`JobSink`] like the production
/// subscription would.
#[derive(Clone)]
pub struct FakeQueue {
    inner: Arc<Mutex<FakeQueueState>>,
    max_deliveries: usize,
}

impl Default for FakeQueue {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeQueueState {
                pending: VecDeque::new(),
                next_id: 1,
                deliveries: Vec::new(),
            })),
            max_deliveries: 10,
        }
    }
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap total deliveries (including redeliveries) before `run` stops.
    pub fn with_max_deliveries(max_deliveries: usize) -> Self {
        Self {
            max_deliveries,
            ..Self::default()
        }
    }

    /// Enqueue a job message.
    pub fn publish(&self, job: &JobMessage) {
        let body = match serde_json::to_vec(job) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "failed to encode job message");
                return;
            }
        };
        self.publish_raw(body);
    }

    /// Enqueue a raw (possibly malformed) body.
    pub fn publish_raw(&self, body: Vec<u8>) {
        let mut state = self.inner.lock();
        let id = format!("m-{}", state.next_id);
        state.next_id += 1;
        state.pending.push_back((id, body));
    }

    /// Outcomes per delivery, in delivery order.
    pub fn deliveries(&self) -> Vec<(String, JobOutcome)> {
        self.inner.lock().deliveries.clone()
    }

    /// Drive the handler until the queue is empty or the delivery cap is
    /// reached. Undecodable bodies are dropped (acked) like production.
    pub async fn run<H: JobSink>(&self, handler: &H) {
        let mut handled = 0;
        loop {
            if handled >= self.max_deliveries {
                return;
            }
            let next = self.inner.lock().pending.pop_front();
            let Some((message_id, body)) = next else {
                return;
            };
            handled += 1;

            let job = match decode_job(&body) {
                Ok(job) => job,
                Err(_) => continue,
            };

            let outcome = handler
                .handle(job, DeliveryContext::new(message_id.clone()))
                .await;
            let mut state = self.inner.lock();
            state.deliveries.push((message_id, outcome.clone()));
            if outcome.queue_action() == QueueAction::Nack {
                // redelivery gets a fresh message id
                let id = format!("m-{}", state.next_id);
                state.next_id += 1;
                state.pending.push_back((id, body));
            }
        }
    }
}
