// # State Store Trait
//
// Defines the interface for the local cache that lets a pass skip the
// remote API entirely.
//
// ## Purpose
//
// The store remembers:
// - The IP the tool last saw authorized on the security group
// - When the remote rule set was last inspected or changed
//
// The remote rule set stays authoritative. A lost or stale cache only costs
// an extra inspection on the next pass.
//
// ## Implementations
//
// - File-based: one plain text file per value (`FileStateStore`)
// - In-memory: tests and embedding (`MemoryStateStore`)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;

/// Cached outcome of earlier passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistedState {
    /// IP believed to be authorized remotely; `None` on first run
    pub last_known_ip: Option<Ipv4Addr>,
    /// Last time the remote rule set was inspected or mutated
    pub last_verified_at: Option<DateTime<Utc>>,
}

impl PersistedState {
    /// True when nothing has ever been written
    pub fn is_first_run(&self) -> bool {
        self.last_known_ip.is_none() && self.last_verified_at.is_none()
    }
}

/// Trait for state store implementations
///
/// # Contract
///
/// - `read_state` never fails. Missing values mean "first run"; unreadable
///   values are logged and reported as absent.
/// - Each write is crash-safe on its own: a reader sees either the old or
///   the new value, never a torn one.
/// - Write failures are returned as
///   [`Error::Persistence`](crate::Error::Persistence). The reconciler logs
///   them and carries on, since the remote change already happened.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the cached state
    async fn read_state(&self) -> PersistedState;

    /// Persist the IP now authorized remotely
    async fn write_ip(&self, ip: Ipv4Addr) -> Result<(), crate::Error>;

    /// Persist the time of the latest inspection or mutation
    async fn write_verified_at(&self, at: DateTime<Utc>) -> Result<(), crate::Error>;
}
