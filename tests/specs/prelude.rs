//! Test helpers for behavioral specifications.
//!
//! One [`Deps`] per spec: fake object bucket, metadata store, state/lock
//! store, and a scripted step runner wired into the real handler and
//! checkpointing engine.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;
use tally_adapters::{
    FakeBucket, FakeMetadataStore, FakeObjectStore, FakeQueue, FakeStateLock,
};
use tally_core::{
    CommentRecord, FakeClock, Instructions, JobMessage, JobOptions, Report, ReportDetails,
    ReportId, ReportMetadata, ReportStatus,
};
use tally_engine::{CheckpointingEngine, FakeStepRunner, HandlerConfig, JobHandler};
use tokio_util::sync::CancellationToken;

pub const REPORT_ID: &str = "R1";
pub const ARTIFACT_KEY: &str = "R1.json";
pub const LOCK_TTL_MS: u64 = 300_000;

pub type SpecHandler = JobHandler<
    FakeObjectStore,
    FakeMetadataStore,
    FakeStateLock,
    CheckpointingEngine<FakeStepRunner, FakeStateLock, FakeClock>,
    FakeClock,
>;

pub struct Deps {
    pub handler: Arc<SpecHandler>,
    pub queue: FakeQueue,
    pub bucket: FakeBucket,
    pub metadata: FakeMetadataStore,
    pub store: FakeStateLock,
    pub runner: FakeStepRunner,
    pub clock: FakeClock,
    pub shutdown: CancellationToken,
}

impl Deps {
    pub fn new() -> Self {
        let clock = FakeClock::default();
        let bucket = FakeBucket::new();
        let metadata = FakeMetadataStore::new();
        let store = FakeStateLock::new(clock.clone());
        let runner = FakeStepRunner::new();
        let shutdown = CancellationToken::new();
        let engine = CheckpointingEngine::new(runner.clone(), store.clone(), clock.clone());
        let handler = Arc::new(JobHandler::new(
            FakeObjectStore::new(bucket.clone()),
            metadata.clone(),
            store.clone(),
            engine,
            clock.clone(),
            HandlerConfig::default(),
            shutdown.clone(),
        ));
        metadata.seed(processing_record(REPORT_ID));
        Deps {
            handler,
            queue: FakeQueue::new(),
            bucket,
            metadata,
            store,
            runner,
            clock,
            shutdown,
        }
    }

    pub fn record(&self) -> ReportMetadata {
        self.metadata
            .record(&ReportId::new(REPORT_ID))
            .expect("metadata record should exist")
    }

    pub fn stored_report(&self) -> Report {
        let bytes = self
            .bucket
            .object(ARTIFACT_KEY)
            .expect("artifact should exist");
        serde_json::from_slice(&bytes).expect("artifact should parse")
    }
}

pub fn processing_record(id: &str) -> ReportMetadata {
    ReportMetadata {
        id: ReportId::new(id),
        user_id: "u-1".to_string(),
        title: "Dogs vs cats".to_string(),
        description: "pet opinions".to_string(),
        report_data_uri: None,
        status: ReportStatus::Processing,
        num_topics: None,
        num_subtopics: None,
        num_claims: None,
        num_people: None,
        created_date: None,
        last_status_update: chrono_now(),
        error_message: None,
    }
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// Returns the path to the tallyd binary in the build target directory.
///
/// Falls back to resolving relative to the test binary itself, which
/// lives at target/debug/deps/specs-<hash>.
fn binary_path() -> PathBuf {
    let standard = Path::new(env!("CARGO_MANIFEST_DIR")).join("target/debug/tallyd");
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("tallyd");
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

/// Invocation builder for the worker binary.
pub fn tallyd() -> Tallyd {
    Tallyd {
        args: Vec::new(),
        clear_env: false,
    }
}

pub struct Tallyd {
    args: Vec<String>,
    clear_env: bool,
}

impl Tallyd {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Strip TALLY_* variables so startup sees an unconfigured process.
    pub fn without_config(mut self) -> Self {
        self.clear_env = true;
        self
    }

    fn output(&self) -> Output {
        let mut command = Command::new(binary_path());
        command.args(&self.args);
        if self.clear_env {
            for (key, _) in std::env::vars() {
                if key.starts_with("TALLY_") {
                    command.env_remove(key);
                }
            }
        }
        command.output().expect("tallyd should spawn")
    }

    pub fn passes(self) -> Checked {
        let output = self.output();
        assert!(
            output.status.success(),
            "expected success, got {:?}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );
        Checked { output }
    }

    pub fn fails_with(self, code: i32) -> Checked {
        let output = self.output();
        assert_eq!(
            output.status.code(),
            Some(code),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        Checked { output }
    }
}

pub struct Checked {
    output: Output,
}

impl Checked {
    pub fn stdout_has(self, needle: &str) -> Self {
        let stdout = String::from_utf8_lossy(&self.output.stdout);
        assert!(stdout.contains(needle), "stdout missing {needle:?}: {stdout}");
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        let stderr = String::from_utf8_lossy(&self.output.stderr);
        assert!(stderr.contains(needle), "stderr missing {needle:?}: {stderr}");
        self
    }
}

pub fn job() -> JobMessage {
    JobMessage {
        id: "job-1".to_string(),
        report_id: ReportId::new(REPORT_ID),
        user_id: "u-1".to_string(),
        request_id: None,
        comments: vec![
            CommentRecord {
                id: "c1".to_string(),
                text: "I like dogs".to_string(),
                speaker: Some("Ada".to_string()),
            },
            CommentRecord {
                id: "c2".to_string(),
                text: "Cats are fine".to_string(),
                speaker: Some("Bo".to_string()),
            },
        ],
        instructions: Instructions {
            system: "be fair".to_string(),
            clustering: "cluster the comments".to_string(),
            extraction: "extract claims".to_string(),
            dedup: "deduplicate claims".to_string(),
            summaries: "summarize topics".to_string(),
            crux: None,
        },
        model: "test-model".to_string(),
        options: JobOptions::default(),
        api_key: "sk-test".to_string(),
        report_details: ReportDetails {
            title: "Dogs vs cats".to_string(),
            description: "pet opinions".to_string(),
            question: "How do people feel about pets?".to_string(),
            filename: "pets".to_string(),
        },
    }
}
