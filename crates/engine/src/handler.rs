// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job handler: exactly one successful completion per report.
//!
//! Life cycle for one delivered message:
//! validate → idempotency check → lock → load-or-start state → run or
//! resume the pipeline → extend the lease → publish (atomic object
//! write, then metadata) → release the lock. The lock is released on
//! every exit path; a failed release is logged, never raised.
//!
//! The handler is the single writer of the lock and of the metadata
//! `completed`/`failed` transitions. Outcomes map to queue actions as:
//! ok and permanent ack, transient nacks for redelivery.

use crate::error::HandlerError;
use crate::formatter;
use crate::pipeline::{PipelineEngine, PipelineInput, RunContext};
use crate::validate;
use async_trait::async_trait;
use std::time::Duration;
use tally_adapters::{
    DeliveryContext, JobSink, MetadataStore, ObjectStore, StateLockStore,
};
use tally_core::{
    artifact_key, Clock, CompletionKind, JobMessage, JobOutcome, PipelineState, PipelineStatus,
    Report, ReportCounts, ReportId, ReportPatch, ReportStatus,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

/// Handler tuning knobs.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Lock lease duration. Must exceed the longest single step but stay
    /// well below the queue's redelivery timeout.
    pub lock_ttl: Duration,
    /// Owner id applied when a message carries no user id (transferred
    /// legacy reports).
    pub fallback_owner: Option<String>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(300),
            fallback_owner: None,
        }
    }
}

/// The orchestrator for one report job per delivery.
#[derive(Clone)]
pub struct JobHandler<O, M, S, P, C> {
    objects: O,
    metadata: M,
    store: S,
    pipeline: P,
    clock: C,
    config: HandlerConfig,
    shutdown: CancellationToken,
}

impl<O, M, S, P, C> JobHandler<O, M, S, P, C>
where
    O: ObjectStore,
    M: MetadataStore,
    S: StateLockStore,
    P: PipelineEngine,
    C: Clock,
{
    pub fn new(
        objects: O,
        metadata: M,
        store: S,
        pipeline: P,
        clock: C,
        config: HandlerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            objects,
            metadata,
            store,
            pipeline,
            clock,
            config,
            shutdown,
        }
    }

    /// Handle one delivered message end to end.
    pub async fn process(&self, job: &JobMessage, delivery: &DeliveryContext) -> JobOutcome {
        let report_id = &job.report_id;

        // Validation precedes lock acquisition; a failure here is
        // terminal and must reach the metadata record before the ack.
        let input = match validate::prepare(job, self.config.fallback_owner.as_deref()) {
            Ok(input) => input,
            Err(e) => return self.fail_validation(report_id, HandlerError::from(e)).await,
        };

        let fencing = delivery.message_id.as_str();
        match self
            .store
            .acquire_lock(report_id, fencing, self.config.lock_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(report_id = %report_id, "another holder owns the lock, skipping");
                return JobOutcome::Ok(CompletionKind::SkippedBusy);
            }
            Err(e) => return HandlerError::from(e).into_outcome(),
        }

        let result = self.run_locked(job, &input, fencing).await;

        // Always release, including after cancellation mid-run.
        match self.store.release_lock(report_id, fencing).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(report_id = %report_id, "lock already expired or taken over at release")
            }
            Err(e) => warn!(report_id = %report_id, error = %e, "lock release failed"),
        }

        match result {
            Ok(kind) => {
                info!(report_id = %report_id, kind = %kind, "job finished");
                JobOutcome::Ok(kind)
            }
            Err(e) => self.finish_error(report_id, e).await,
        }
    }

    /// Everything that happens while holding the lock.
    async fn run_locked(
        &self,
        job: &JobMessage,
        input: &PipelineInput,
        fencing: &str,
    ) -> Result<CompletionKind, HandlerError> {
        let report_id = &job.report_id;
        self.check_cancelled()?;

        // Idempotency: a finished artifact means this delivery is a
        // duplicate or a recovery of a half-finished publish. Permanent
        // errors here (bucket permissions) are marked failed centrally
        // in finish_error.
        let key = artifact_key(report_id);
        match self.objects.file_exists(&key).await {
            Err(e) => return Err(e.into()),
            Ok(true) => {
                let record = self.metadata.get(report_id).await?;
                if record.is_some_and(|r| r.status == ReportStatus::Completed) {
                    info!(report_id = %report_id, "artifact and metadata already final");
                    return Ok(CompletionKind::IdempotentSkip);
                }
                // Orphaned artifact: the object exists but metadata never
                // caught up. Finish the bookkeeping; never re-run.
                info!(report_id = %report_id, "orphaned artifact, taking save-only path");
                return self.save_only(job, input).await;
            }
            Ok(false) => {}
        }

        // Load state and decide between fresh run, resume, save-only,
        // and backing off from a live run.
        let resume = match self.store.get_state(report_id).await? {
            Some(state) if state.status == PipelineStatus::Completed => {
                info!(report_id = %report_id, "state already completed, republishing");
                return self.publish_from_state(job, input, &state).await;
            }
            Some(state) if state.status == PipelineStatus::Running => {
                let age = state.age_ms(self.clock.epoch_ms());
                if age < self.config.lock_ttl.as_millis() as u64 {
                    info!(report_id = %report_id, age_ms = age, "live run elsewhere, skipping");
                    return Ok(CompletionKind::SkippedLive);
                }
                info!(report_id = %report_id, age_ms = age, "abandoned run, resuming");
                true
            }
            Some(_) => {
                info!(report_id = %report_id, "failed run found, resuming");
                true
            }
            None => false,
        };

        self.check_cancelled()?;

        // Heartbeat the processing status; the run itself is the source
        // of truth, so a failure here only logs.
        if let Err(e) = self
            .metadata
            .modify(report_id, ReportPatch::processing(self.clock.now()))
            .await
        {
            warn!(report_id = %report_id, error = %e, "failed to refresh processing status");
        }

        let ctx = RunContext {
            report_id: report_id.clone(),
            resume_from_state: resume,
            lock_value: fencing.to_string(),
            lock_ttl: self.config.lock_ttl,
        };
        let run = self.pipeline.run(input, &ctx).await?;
        if !run.success {
            let failure = match run.error {
                Some(failure) => failure,
                None => {
                    return Err(HandlerError::Corrupt(
                        "failed run carried no failure detail".to_string(),
                    ))
                }
            };
            self.mark_failed(report_id, &failure.message).await;
            return Err(HandlerError::Pipeline {
                step: failure.step,
                message: failure.message,
                transient: failure.transient,
            });
        }
        let outputs = match run.outputs {
            Some(outputs) => outputs,
            None => {
                return Err(HandlerError::Corrupt(
                    "successful run carried no outputs".to_string(),
                ))
            }
        };

        self.check_cancelled()?;

        // Re-arm the lease to cover the publish; a holder whose lease
        // silently expired must not publish.
        if !self
            .store
            .extend_lock(report_id, fencing, self.config.lock_ttl)
            .await?
        {
            self.mark_failed(report_id, "lock lost during processing").await;
            return Err(HandlerError::LockLost);
        }

        let report = formatter::compose(
            &job.report_details,
            input,
            &run.state,
            &outputs,
            self.clock.now(),
        );
        self.publish(report_id, input, &report).await?;
        Ok(CompletionKind::Completed)
    }

    /// Save-only path for an orphaned artifact: state must already be
    /// completed, otherwise the stores disagree in a way recovery cannot
    /// fix and the job is terminally corrupt.
    async fn save_only(
        &self,
        job: &JobMessage,
        input: &PipelineInput,
    ) -> Result<CompletionKind, HandlerError> {
        let report_id = &job.report_id;
        match self.store.get_state(report_id).await? {
            Some(state) if state.status == PipelineStatus::Completed => {
                self.publish_from_state(job, input, &state).await
            }
            other => {
                let message = format!(
                    "artifact present but pipeline state is {}",
                    other
                        .map(|s| format!("{:?}", s.status))
                        .unwrap_or_else(|| "missing".to_string())
                );
                Err(HandlerError::Corrupt(message))
            }
        }
    }

    /// Rebuild the artifact from completed state and publish it.
    ///
    /// Reconstruction failures indicate state-store corruption and
    /// surface as [`HandlerError::Corrupt`].
    async fn publish_from_state(
        &self,
        job: &JobMessage,
        input: &PipelineInput,
        state: &PipelineState,
    ) -> Result<CompletionKind, HandlerError> {
        let report_id = &job.report_id;
        let report =
            formatter::reconstruct(&job.report_details, input, state, self.clock.now())?;
        self.publish(report_id, input, &report).await?;
        Ok(CompletionKind::Completed)
    }

    /// Atomic object write, then metadata completion; rolls the object
    /// back when the metadata write fails so the stores stay consistent.
    async fn publish(
        &self,
        report_id: &ReportId,
        input: &PipelineInput,
        report: &Report,
    ) -> Result<(), HandlerError> {
        let key = artifact_key(report_id);
        let bytes = serde_json::to_vec(report)
            .map_err(|e| HandlerError::Corrupt(format!("artifact does not serialize: {e}")))?;

        let url = self
            .objects
            .store_file(&key, &bytes, "application/json")
            .await?;

        let counts = ReportCounts::derive(&report.sorted_tree, &input.comments);
        let patch = ReportPatch::completed(url, counts, self.clock.now());
        if let Err(e) = self.metadata.modify(report_id, patch).await {
            // Best-effort rollback; the original error drives the outcome.
            warn!(report_id = %report_id, error = %e, "metadata write failed, rolling back artifact");
            if let Err(del) = self.objects.delete_file(&key).await {
                warn!(report_id = %report_id, error = %del, "artifact rollback delete failed");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Record a validation failure on the metadata record, then ack.
    ///
    /// The failed status must be durable before the ack; when the write
    /// itself fails transiently the message is redelivered instead.
    async fn fail_validation(&self, report_id: &ReportId, error: HandlerError) -> JobOutcome {
        let message = error.to_string();
        match self
            .metadata
            .modify(report_id, ReportPatch::failed(&message, self.clock.now()))
            .await
        {
            Ok(_) => error.into_outcome(),
            Err(e) if e.transient => {
                warn!(report_id = %report_id, error = %e, "could not record validation failure yet");
                JobOutcome::transient(format!("failed to record validation failure: {e}"))
            }
            Err(e) => {
                warn!(report_id = %report_id, error = %e, "could not record validation failure");
                error.into_outcome()
            }
        }
    }

    /// Best-effort failed-status write.
    async fn mark_failed(&self, report_id: &ReportId, message: &str) {
        if let Err(e) = self
            .metadata
            .modify(report_id, ReportPatch::failed(message, self.clock.now()))
            .await
        {
            warn!(report_id = %report_id, error = %e, "failed to mark report failed");
        }
    }

    /// Map a handler error to its outcome, recording permanent failures
    /// that were not already written at their site.
    ///
    /// Pipeline failures and lock loss are marked where they happen;
    /// metadata errors are the failing store itself, so writing a failed
    /// status there would fail the same way. Every other permanent error
    /// (bucket, state store, corruption) is recorded here so a
    /// never-redelivered message cannot leave the record stuck at
    /// `processing`.
    async fn finish_error(&self, report_id: &ReportId, error: HandlerError) -> JobOutcome {
        match &error {
            HandlerError::Storage(e) if !e.is_transient() => {
                self.mark_failed(report_id, &error.to_string()).await;
            }
            HandlerError::StateStore(e) if !e.transient => {
                self.mark_failed(report_id, &error.to_string()).await;
            }
            HandlerError::Corrupt(_) => {
                self.mark_failed(report_id, &error.to_string()).await;
            }
            _ => {}
        }
        warn!(report_id = %report_id, error = %error, category = %error.category(), "job failed");
        error.into_outcome()
    }

    fn check_cancelled(&self) -> Result<(), HandlerError> {
        if self.shutdown.is_cancelled() {
            Err(HandlerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<O, M, S, P, C> JobSink for JobHandler<O, M, S, P, C>
where
    O: ObjectStore,
    M: MetadataStore,
    S: StateLockStore,
    P: PipelineEngine,
    C: Clock,
{
    async fn handle(&self, job: JobMessage, delivery: DeliveryContext) -> JobOutcome {
        let span = tracing::info_span!(
            "job",
            report_id = %job.report_id,
            message_id = %delivery.message_id
        );
        self.process(&job, &delivery).instrument(span).await
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
