// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP step runner.
//!
//! The LLM-backed steps run in a separate pipeline service; the worker
//! calls it once per step at `POST {base}/steps/{step}` and checkpoints
//! the returned result. Request timeouts are bounded by the lock TTL:
//! a step that cannot finish within the lease cannot be published
//! anyway.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tally_core::classify::{is_transient, ErrorFacets};
use tally_core::{CommentRecord, Instructions, JobOptions, StepName};
use tally_engine::{PipelineInput, StepError, StepOutput, StepRunner};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepRequest<'a> {
    comments: &'a [CommentRecord],
    completed: &'a BTreeMap<StepName, Value>,
    instructions: &'a Instructions,
    model: &'a str,
    api_key: &'a str,
    options: &'a JobOptions,
}

#[derive(Deserialize, Default)]
struct StepUsage {
    #[serde(default)]
    tokens: u64,
    #[serde(default)]
    cost: f64,
}

#[derive(Deserialize)]
struct StepResponse {
    result: Value,
    #[serde(default)]
    usage: StepUsage,
}

/// [`StepRunner`] calling the external pipeline step service.
#[derive(Clone)]
pub struct HttpStepRunner {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStepRunner {
    pub fn new(base_url: impl Into<String>, step_timeout: Duration) -> Result<Self, StepError> {
        let client = reqwest::Client::builder()
            .timeout(step_timeout)
            .build()
            .map_err(|e| StepError::permanent(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn step_url(&self, step: StepName) -> String {
        format!("{}/steps/{step}", self.base_url)
    }
}

fn status_error(step: StepName, status: u16, body: &str) -> StepError {
    let message = format!("step {step} responded {status}: {body}");
    let facets = ErrorFacets {
        http_status: Some(status),
        store_code: None,
        message: &message,
    };
    StepError {
        transient: is_transient(facets),
        message,
    }
}

#[async_trait::async_trait]
impl StepRunner for HttpStepRunner {
    async fn run_step(
        &self,
        step: StepName,
        input: &PipelineInput,
        completed: &BTreeMap<StepName, Value>,
    ) -> Result<StepOutput, StepError> {
        let request = StepRequest {
            comments: &input.comments,
            completed,
            instructions: &input.instructions,
            model: &input.model,
            api_key: &input.api_key,
            options: &input.options,
        };

        let response = self
            .client
            .post(self.step_url(step))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let message = format!("step {step} request failed: {e}");
                if e.is_timeout() || e.is_connect() {
                    StepError::transient(message)
                } else {
                    StepError::permanent(message)
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(step, status, &body));
        }

        let parsed: StepResponse = response.json().await.map_err(|e| {
            StepError::permanent(format!("step {step} returned unreadable body: {e}"))
        })?;
        Ok(StepOutput {
            result: parsed.result,
            tokens: parsed.usage.tokens,
            cost: parsed.usage.cost,
        })
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
