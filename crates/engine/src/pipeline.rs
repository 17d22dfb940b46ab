// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline engine: ordered steps with durable checkpoints.
//!
//! The LLM-backed step implementations live behind [`StepRunner`]; this
//! module owns the sequencing. The contract the handler relies on:
//!
//! - state is persisted after every step transition, so a step marked
//!   complete implies its result is durable;
//! - when resuming, steps already completed are never re-executed and
//!   their stored results feed forward;
//! - on failure the state is persisted with `failed` status and the
//!   failing step recorded, so the next delivery can resume.
//!
//! The lease is extended before each step as a heartbeat: a holder whose
//! lock silently expired finds out at the next step boundary instead of
//! publishing over someone else's run.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tally_adapters::{StateLockStore, StateStoreError};
use tally_core::{
    plan_for, Clock, CommentRecord, Instructions, JobOptions, PipelineState, PipelineStatus,
    ReportId, SortedTree, StepName,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

/// Validated pipeline input derived from a job message.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub user_id: String,
    pub comments: Vec<CommentRecord>,
    pub instructions: Instructions,
    pub model: String,
    pub api_key: String,
    pub options: JobOptions,
}

/// Per-run context handed to the engine by the handler.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub report_id: ReportId,
    /// Resume from persisted state, skipping completed steps.
    pub resume_from_state: bool,
    /// Fencing value of the lock held for this run.
    pub lock_value: String,
    pub lock_ttl: Duration,
}

/// Failure detail for a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub step: StepName,
    pub message: String,
    pub transient: bool,
}

/// Final outputs of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub sorted_tree: SortedTree,
    pub cruxes: Option<Value>,
}

/// Result of driving the pipeline for one report.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub success: bool,
    pub state: PipelineState,
    pub outputs: Option<PipelineOutputs>,
    pub error: Option<PipelineFailure>,
}

/// Output of one successfully executed step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub result: Value,
    pub tokens: u64,
    pub cost: f64,
}

/// Error from one step execution.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StepError {
    pub message: String,
    pub transient: bool,
}

impl StepError {
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

/// The external collaborator executing a single named step.
///
/// The summaries step's result is the full sorted tree; the cruxes
/// step's result is the cruxes document. Earlier steps' results are
/// intermediate and only consumed by later steps via `completed`.
#[async_trait]
pub trait StepRunner: Send + Sync + 'static {
    async fn run_step(
        &self,
        step: StepName,
        input: &PipelineInput,
        completed: &BTreeMap<StepName, Value>,
    ) -> Result<StepOutput, StepError>;
}

/// Opaque pipeline engine contract used by the handler.
#[async_trait]
pub trait PipelineEngine: Send + Sync + 'static {
    /// Drive the plan to completion or first failure.
    ///
    /// Infrastructure errors talking to the state store surface as `Err`;
    /// step failures surface as `Ok` with `success == false` and the
    /// state persisted as failed.
    async fn run(
        &self,
        input: &PipelineInput,
        ctx: &RunContext,
    ) -> Result<PipelineRun, StateStoreError>;
}

/// [`PipelineEngine`] that checkpoints into a [`StateLockStore`] after
/// every step transition.
#[derive(Clone)]
pub struct CheckpointingEngine<R, S, C> {
    runner: R,
    store: S,
    clock: C,
}

impl<R, S, C> CheckpointingEngine<R, S, C>
where
    R: StepRunner,
    S: StateLockStore,
    C: Clock,
{
    pub fn new(runner: R, store: S, clock: C) -> Self {
        Self {
            runner,
            store,
            clock,
        }
    }

    async fn save(
        &self,
        id: &ReportId,
        state: &mut PipelineState,
    ) -> Result<(), StateStoreError> {
        state.updated_at = self.store.save_state(id, state).await?;
        Ok(())
    }

    fn failed_run(state: PipelineState, failure: PipelineFailure) -> PipelineRun {
        PipelineRun {
            success: false,
            state,
            outputs: None,
            error: Some(failure),
        }
    }
}

#[async_trait]
impl<R, S, C> PipelineEngine for CheckpointingEngine<R, S, C>
where
    R: StepRunner,
    S: StateLockStore,
    C: Clock,
{
    async fn run(
        &self,
        input: &PipelineInput,
        ctx: &RunContext,
    ) -> Result<PipelineRun, StateStoreError> {
        let id = &ctx.report_id;
        let plan = plan_for(&input.options);

        let mut state = if ctx.resume_from_state {
            match self.store.get_state(id).await? {
                Some(existing) => existing,
                None => PipelineState::new(id.clone()),
            }
        } else {
            PipelineState::new(id.clone())
        };
        state.status = PipelineStatus::Running;
        self.save(id, &mut state).await?;

        for step in plan.iter().copied() {
            if state.is_step_completed(step) {
                info!(report_id = %id, step = %step, "step already completed, skipping");
                continue;
            }

            // Heartbeat: keep the lease ahead of the next step.
            if !self
                .store
                .extend_lock(id, &ctx.lock_value, ctx.lock_ttl)
                .await?
            {
                let message = format!("lock lost before step {step}");
                warn!(report_id = %id, step = %step, "lease expired mid-run");
                state.fail_step(step, &message, self.clock.epoch_ms());
                self.save(id, &mut state).await?;
                return Ok(Self::failed_run(
                    state,
                    PipelineFailure {
                        step,
                        message,
                        transient: true,
                    },
                ));
            }

            state.begin_step(step, self.clock.epoch_ms());
            self.save(id, &mut state).await?;
            info!(report_id = %id, step = %step, "running step");

            match self.runner.run_step(step, input, &state.completed_results).await {
                Ok(output) => {
                    state.complete_step(
                        step,
                        output.result,
                        output.tokens,
                        output.cost,
                        self.clock.epoch_ms(),
                    );
                    self.save(id, &mut state).await?;
                }
                Err(e) => {
                    warn!(report_id = %id, step = %step, error = %e, "step failed");
                    state.fail_step(step, &e.message, self.clock.epoch_ms());
                    self.save(id, &mut state).await?;
                    return Ok(Self::failed_run(
                        state,
                        PipelineFailure {
                            step,
                            message: e.message,
                            transient: e.transient,
                        },
                    ));
                }
            }
        }

        state.finish(&plan);
        self.save(id, &mut state).await?;

        // The summaries result is the final sorted tree.
        let outputs = match state
            .completed_results
            .get(&StepName::Summaries)
            .cloned()
            .map(serde_json::from_value::<SortedTree>)
        {
            Some(Ok(sorted_tree)) => PipelineOutputs {
                sorted_tree,
                cruxes: state.completed_results.get(&StepName::Cruxes).cloned(),
            },
            Some(Err(e)) => {
                let failure = PipelineFailure {
                    step: StepName::Summaries,
                    message: format!("summaries step produced an unreadable tree: {e}"),
                    transient: false,
                };
                return Ok(Self::failed_run(state, failure));
            }
            None => {
                let failure = PipelineFailure {
                    step: StepName::Summaries,
                    message: "plan finished without a summaries result".to_string(),
                    transient: false,
                };
                return Ok(Self::failed_run(state, failure));
            }
        };

        Ok(PipelineRun {
            success: true,
            state,
            outputs: Some(outputs),
            error: None,
        })
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeStepRunner;

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
