// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker.
//!
//! The full knob set, per deployment environment. Anything missing or
//! malformed fails startup (exit code 1); there are no hidden defaults
//! beyond the ones listed here.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Env {
    Prod,
    Dev,
    Test,
}

impl Env {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "prod" => Some(Env::Prod),
            "dev" => Some(Env::Dev),
            "test" => Some(Env::Test),
            _ => None,
        }
    }
}

/// Configuration errors, all fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub env: Env,
    /// Artifact bucket name.
    pub bucket: String,
    /// GCP project id for the metadata store.
    pub firestore_project: String,
    /// Lock/state store connection URL.
    pub redis_url: String,
    /// Base URL of the pipeline step service.
    pub pipeline_url: String,
    /// Queue subscription to consume.
    pub subscription: String,
    /// Topic the subscription is attached to (informational).
    pub topic: String,
    /// Maximum messages handled concurrently per worker process.
    pub concurrency: usize,
    /// Per-message ack deadline requested from the queue.
    pub ack_deadline: Duration,
    /// Report lock lease duration.
    pub lock_ttl: Duration,
    /// Owner id for transferred legacy reports with no user id.
    pub fallback_owner: Option<String>,
}

const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_ACK_DEADLINE_SECS: u64 = 600;
const DEFAULT_LOCK_TTL_SECS: u64 = 300;

impl Config {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load from an explicit variable map (testable).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            vars.get(var)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let env_raw = required("TALLY_ENV")?;
        let env = Env::parse(&env_raw).ok_or(ConfigError::Invalid {
            var: "TALLY_ENV",
            value: env_raw,
        })?;

        let parse_u64 = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            match vars.get(var).map(|s| s.trim()).filter(|s| !s.is_empty()) {
                None => Ok(default),
                Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                    var,
                    value: raw.to_string(),
                }),
            }
        };

        let concurrency = parse_u64("TALLY_CONCURRENCY", DEFAULT_CONCURRENCY as u64)?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "TALLY_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            env,
            bucket: required("TALLY_BUCKET")?,
            firestore_project: required("TALLY_FIRESTORE_PROJECT")?,
            redis_url: required("TALLY_REDIS_URL")?,
            pipeline_url: required("TALLY_PIPELINE_URL")?,
            subscription: required("TALLY_PUBSUB_SUBSCRIPTION")?,
            topic: required("TALLY_PUBSUB_TOPIC")?,
            concurrency: concurrency as usize,
            ack_deadline: Duration::from_secs(parse_u64(
                "TALLY_ACK_DEADLINE_SECS",
                DEFAULT_ACK_DEADLINE_SECS,
            )?),
            lock_ttl: Duration::from_secs(parse_u64(
                "TALLY_LOCK_TTL_SECS",
                DEFAULT_LOCK_TTL_SECS,
            )?),
            fallback_owner: vars
                .get("TALLY_FALLBACK_OWNER")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }

    /// Metadata collection for this environment.
    pub fn collection(&self) -> &'static str {
        match self.env {
            Env::Prod => "reportRef",
            Env::Dev | Env::Test => "reportRef_dev",
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
