// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Holds state for the lifetime of the value only. Used by tests and by
// embedders that run several passes inside one process.
//
// ## Crash Behavior
//
// - All state is lost when the process exits
// - The next pass after a restart is a first run: it inspects the remote
//   rule set, which is harmless

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{PersistedState, StateStore};

/// In-memory state store implementation
///
/// Clones share the same underlying state, so a test can keep one handle
/// for assertions while the reconciler owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<PersistedState>>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `state`
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
            ..Self::default()
        }
    }

    /// Current contents
    pub async fn snapshot(&self) -> PersistedState {
        *self.inner.read().await
    }

    /// Number of successful writes (IP and timestamp combined)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with a persistence error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence("memory store is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read_state(&self) -> PersistedState {
        *self.inner.read().await
    }

    async fn write_ip(&self, ip: Ipv4Addr) -> Result<(), Error> {
        self.check_writable()?;
        self.inner.write().await.last_known_ip = Some(ip);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_verified_at(&self, at: DateTime<Utc>) -> Result<(), Error> {
        self.check_writable()?;
        self.inner.write().await.last_verified_at = Some(at);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
