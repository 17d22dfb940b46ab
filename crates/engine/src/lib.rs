// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tally-engine: job handler, checkpointing pipeline engine, and
//! artifact formatter

mod error;
mod formatter;
mod handler;
mod pipeline;
mod validate;

pub use error::HandlerError;
pub use formatter::{compose, reconstruct};
pub use handler::{HandlerConfig, JobHandler};
pub use pipeline::{
    CheckpointingEngine, PipelineEngine, PipelineFailure, PipelineInput, PipelineOutputs,
    PipelineRun, RunContext, StepError, StepOutput, StepRunner,
};
pub use validate::ValidationError;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use pipeline::FakeStepRunner;
