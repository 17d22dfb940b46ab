// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Report pipeline worker daemon (tallyd).
//!
//! Consumes "process these comments" jobs from the queue subscription
//! and publishes durable JSON report artifacts. Exit code 0 on graceful
//! shutdown, 1 on startup failure (bad config or failed health checks).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use tally_adapters::{
    BucketStore, FirestoreMetadata, GcsBucket, InFlight, ObjectStore, PubsubQueue, RedisStateLock,
    StateLockStore,
};
use tally_core::SystemClock;
use tally_engine::{CheckpointingEngine, HandlerConfig, JobHandler};
use tally_worker::{Config, HttpStepRunner};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Bounded wait for in-flight handlers after shutdown is requested.
const DRAIN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // Handle info flags before any config or connection work
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("tallyd {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--help" | "-h" | "help" => {
                println!("tallyd {}", env!("CARGO_PKG_VERSION"));
                println!("Report pipeline worker - consumes comment-processing jobs");
                println!("and publishes report artifacts.");
                println!();
                println!("USAGE:");
                println!("    tallyd");
                println!();
                println!("Configuration comes from TALLY_* environment variables;");
                println!("see the repository README for the full list.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: tallyd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tallyd: {e}");
            return 1;
        }
    };

    setup_logging();
    info!(
        env = ?config.env,
        bucket = %config.bucket,
        subscription = %config.subscription,
        concurrency = config.concurrency,
        lock_ttl_secs = config.lock_ttl.as_secs(),
        ack_deadline_secs = config.ack_deadline.as_secs(),
        "starting worker"
    );

    // Build production adapters
    let objects = match GcsBucket::connect(&config.bucket).await {
        Ok(bucket) => BucketStore::new(bucket),
        Err(e) => {
            error!(error = %e, "object store connection failed");
            return 1;
        }
    };
    let metadata = match FirestoreMetadata::connect(&config.firestore_project, config.collection())
        .await
    {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "metadata store connection failed");
            return 1;
        }
    };
    let store = match RedisStateLock::connect(&config.redis_url).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "state store connection failed");
            return 1;
        }
    };
    let queue = match PubsubQueue::connect(&config.subscription, config.concurrency).await {
        Ok(queue) => queue,
        Err(e) => {
            error!(error = %e, "queue connection failed");
            return 1;
        }
    };

    // Startup health checks: fail fast instead of consuming messages a
    // broken worker can only nack.
    if let Err(e) = objects.health_check().await {
        error!(error = %e, "bucket health check failed");
        return 1;
    }
    if let Err(e) = store.ping().await {
        error!(error = %e, "state store health check failed");
        return 1;
    }

    let runner = match HttpStepRunner::new(&config.pipeline_url, config.lock_ttl) {
        Ok(runner) => runner,
        Err(e) => {
            error!(error = %e, "step runner setup failed");
            return 1;
        }
    };

    let shutdown = queue.cancel_token();
    let engine = CheckpointingEngine::new(runner, store.clone(), SystemClock);
    let handler = Arc::new(JobHandler::new(
        objects,
        metadata,
        store,
        engine,
        SystemClock,
        HandlerConfig {
            lock_ttl: config.lock_ttl,
            fallback_owner: config.fallback_owner.clone(),
        },
        shutdown.clone(),
    ));
    let in_flight = InFlight::new();

    // Graceful shutdown: stop intake on SIGTERM/SIGINT; in-flight
    // handlers observe cancellation at their next suspension point and
    // surface transient outcomes (lock released, state preserved).
    if let Err(e) = spawn_signal_task(queue.clone()) {
        error!(error = %e, "signal handler setup failed");
        return 1;
    }

    info!("worker ready, consuming jobs");
    let result = queue.subscribe(handler, in_flight.clone()).await;

    if !in_flight.drain(DRAIN_GRACE).await {
        warn!(
            active = in_flight.active(),
            "shutdown grace period elapsed with handlers still in flight"
        );
    }

    match result {
        Ok(()) => {
            info!("worker stopped");
            0
        }
        Err(e) => {
            error!(error = %e, "subscription terminated abnormally");
            1
        }
    }
}

fn spawn_signal_task(queue: PubsubQueue) -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
        queue.close();
    });
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
