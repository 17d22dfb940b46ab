// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tally-worker: process bootstrap for the report pipeline worker

pub mod config;
pub mod steps;

pub use config::{Config, ConfigError, Env};
pub use steps::HttpStepRunner;
