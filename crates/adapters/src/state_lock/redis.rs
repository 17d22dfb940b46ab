// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed state/lock store.
//!
//! Lock acquisition is `SET NX PX`; extend and release are Lua scripts
//! so the value compare and the mutation are a single atomic step on
//! the server.

use super::{lock_key, state_key, StateLockStore, StateStoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ErrorKind, RedisError, Script};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{Clock, PipelineState, ReportId, SystemClock};

/// Extend the TTL only while we still hold the lease.
const EXTEND_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('pexpire', KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Delete the lease only while we still hold it.
const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

/// Redis-backed [`StateLockStore`].
#[derive(Clone)]
pub struct RedisStateLock<C: Clock = SystemClock> {
    conn: ConnectionManager,
    clock: C,
    extend: Arc<Script>,
    release: Arc<Script>,
}

impl RedisStateLock<SystemClock> {
    /// Connect to the configured Redis instance.
    pub async fn connect(url: &str) -> Result<Self, StateStoreError> {
        Self::connect_with_clock(url, SystemClock).await
    }
}

impl<C: Clock> RedisStateLock<C> {
    pub async fn connect_with_clock(url: &str, clock: C) -> Result<Self, StateStoreError> {
        let client = redis::Client::open(url).map_err(convert)?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(convert)?;
        Ok(Self {
            conn,
            clock,
            extend: Arc::new(Script::new(EXTEND_SCRIPT)),
            release: Arc::new(Script::new(RELEASE_SCRIPT)),
        })
    }
}

fn convert(err: RedisError) -> StateStoreError {
    let message = format!("redis: {err}");
    let transient = matches!(
        err.kind(),
        ErrorKind::IoError
            | ErrorKind::BusyLoadingError
            | ErrorKind::TryAgain
            | ErrorKind::ClusterDown
            | ErrorKind::MasterDown
    ) || err.is_connection_dropped()
        || err.is_connection_refusal();
    if transient {
        StateStoreError::transient(message)
    } else {
        StateStoreError::permanent(message)
    }
}

fn ttl_ms(ttl: Duration) -> u64 {
    ttl.as_millis() as u64
}

#[async_trait]
impl<C: Clock> StateLockStore for RedisStateLock<C> {
    async fn get_state(&self, id: &ReportId) -> Result<Option<PipelineState>, StateStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(state_key(id))
            .query_async(&mut conn)
            .await
            .map_err(convert)?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                StateStoreError::permanent(format!("corrupt state for report {id}: {e}"))
            }),
        }
    }

    async fn save_state(
        &self,
        id: &ReportId,
        state: &PipelineState,
    ) -> Result<u64, StateStoreError> {
        let mut stored = state.clone();
        // Strictly advancing even if the wall clock stalls.
        stored.updated_at = self.clock.epoch_ms().max(state.updated_at + 1);
        let json = serde_json::to_string(&stored)
            .map_err(|e| StateStoreError::permanent(format!("unserializable state: {e}")))?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(state_key(id))
            .arg(json)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(convert)?;
        Ok(stored.updated_at)
    }

    async fn acquire_lock(
        &self,
        id: &ReportId,
        fencing: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(lock_key(id))
            .arg(fencing)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms(ttl))
            .query_async(&mut conn)
            .await
            .map_err(convert)?;
        Ok(reply.is_some())
    }

    async fn verify_lock(&self, id: &ReportId, fencing: &str) -> Result<bool, StateStoreError> {
        let mut conn = self.conn.clone();
        let current: Option<String> = redis::cmd("GET")
            .arg(lock_key(id))
            .query_async(&mut conn)
            .await
            .map_err(convert)?;
        Ok(current.as_deref() == Some(fencing))
    }

    async fn extend_lock(
        &self,
        id: &ReportId,
        fencing: &str,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let mut conn = self.conn.clone();
        let extended: i64 = self
            .extend
            .key(lock_key(id))
            .arg(fencing)
            .arg(ttl_ms(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(convert)?;
        Ok(extended == 1)
    }

    async fn release_lock(&self, id: &ReportId, fencing: &str) -> Result<bool, StateStoreError> {
        let mut conn = self.conn.clone();
        let released: i64 = self
            .release
            .key(lock_key(id))
            .arg(fencing)
            .invoke_async(&mut conn)
            .await
            .map_err(convert)?;
        Ok(released == 1)
    }

    async fn ping(&self) -> Result<(), StateStoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(convert)
    }
}
