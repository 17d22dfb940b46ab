// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Google Cloud Pub/Sub subscription adapter

use super::{decode_job, DeliveryContext, InFlight, JobSink, QueueError};
use google_cloud_pubsub::client::{Client, ClientConfig};
use google_cloud_pubsub::subscription::{ReceiveConfig, Subscription};
use std::sync::Arc;
use tally_core::QueueAction;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Pub/Sub-backed job queue subscription.
#[derive(Clone)]
pub struct PubsubQueue {
    subscription: Subscription,
    cancel: CancellationToken,
    concurrency: usize,
}

impl PubsubQueue {
    /// Connect using ambient application-default credentials and verify
    /// the subscription exists.
    pub async fn connect(subscription_name: &str, concurrency: usize) -> Result<Self, QueueError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| QueueError(format!("pubsub auth failed: {e}")))?;
        let client = Client::new(config)
            .await
            .map_err(|e| QueueError(format!("pubsub client failed: {e}")))?;
        let subscription = client.subscription(subscription_name);
        let exists = subscription
            .exists(None)
            .await
            .map_err(|e| QueueError(format!("subscription check failed: {e}")))?;
        if !exists {
            return Err(QueueError(format!(
                "subscription {subscription_name} does not exist"
            )));
        }
        Ok(Self {
            subscription,
            cancel: CancellationToken::new(),
            concurrency,
        })
    }

    /// Token cancelled by [`close`](Self::close).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting new messages; in-flight handlers finish naturally.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Receive messages until cancelled, feeding each through `handler`.
    ///
    /// Flow control caps concurrently handled messages at the configured
    /// concurrency; there is no internal queueing beyond that.
    pub async fn subscribe<H: JobSink>(
        &self,
        handler: Arc<H>,
        in_flight: InFlight,
    ) -> Result<(), QueueError> {
        let config = ReceiveConfig {
            worker_count: self.concurrency,
            ..Default::default()
        };
        self.subscription
            .receive(
                move |message, _cancel| {
                    let handler = Arc::clone(&handler);
                    let in_flight = in_flight.clone();
                    async move {
                        let _guard = in_flight.begin();
                        let message_id = message.message.message_id.clone();
                        let delivery = DeliveryContext {
                            message_id: message_id.clone(),
                            attributes: message.message.attributes.clone(),
                        };

                        let job = match decode_job(&message.message.data) {
                            Ok(job) => job,
                            Err(e) => {
                                // No report to mark failed; ack so the
                                // malformed message cannot loop forever.
                                error!(message_id = %message_id, error = %e, "undecodable job message, acking");
                                if let Err(ack_err) = message.ack().await {
                                    warn!(message_id = %message_id, error = %ack_err, "ack failed");
                                }
                                return;
                            }
                        };

                        let report_id = job.report_id.clone();
                        let outcome = handler.handle(job, delivery).await;
                        info!(
                            report_id = %report_id,
                            message_id = %message_id,
                            outcome = %outcome,
                            "job handled"
                        );
                        let result = match outcome.queue_action() {
                            QueueAction::Ack => message.ack().await,
                            QueueAction::Nack => message.nack().await,
                        };
                        if let Err(e) = result {
                            warn!(message_id = %message_id, error = %e, "ack/nack failed");
                        }
                    }
                },
                self.cancel.clone(),
                Some(config),
            )
            .await
            .map_err(|e| QueueError(format!("subscription receive failed: {e}")))
    }
}
