// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external I/O.
//!
//! One module per backing service, each holding the contract trait, a
//! classified error type, the production adapter, and a fake. Raw client
//! errors never escape this crate: every operation surfaces an error that
//! has already been through the transient/permanent classifier.

pub mod metadata;
pub mod object_store;
pub mod queue;
pub mod state_lock;

pub use metadata::{FirestoreMetadata, MetadataError, MetadataStore};
pub use object_store::{
    BucketOps, BucketStore, GcsBucket, ObjectStore, StorageError, StorageErrorKind,
};
pub use queue::{decode_job, DeliveryContext, InFlight, JobSink, PubsubQueue, QueueError};
pub use state_lock::{lock_key, state_key, RedisStateLock, StateLockStore, StateStoreError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use metadata::FakeMetadataStore;
#[cfg(any(test, feature = "test-support"))]
pub use object_store::{FakeBucket, FakeObjectStore, FakeOp};
#[cfg(any(test, feature = "test-support"))]
pub use queue::FakeQueue;
#[cfg(any(test, feature = "test-support"))]
pub use state_lock::{FakeStateLock, StoreOp};
