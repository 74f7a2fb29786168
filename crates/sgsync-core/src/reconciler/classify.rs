//! CLASSIFY step: pure comparison of the live IP against cached state.

use chrono::{DateTime, Duration, Utc};
use std::net::Ipv4Addr;

use crate::traits::PersistedState;

/// Result of comparing the current IP and clock against cached state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// No cached IP, or the cached IP differs from the current one
    pub ip_changed: bool,
    /// No cached verification time, or it is at least one interval old
    pub force_check_due: bool,
}

impl Classification {
    /// Whether the pass has to look at the remote rule set at all
    pub fn needs_inspection(&self) -> bool {
        self.ip_changed || self.force_check_due
    }
}

/// Classify a pass
///
/// A verification time in the future (clock moved backwards) counts as
/// fresh; the next pass after the clock catches up will recheck.
pub fn classify(
    current_ip: Ipv4Addr,
    state: &PersistedState,
    now: DateTime<Utc>,
    force_check_interval: Duration,
) -> Classification {
    let ip_changed = state.last_known_ip != Some(current_ip);

    let force_check_due = match state.last_verified_at {
        None => true,
        Some(verified_at) => now.signed_duration_since(verified_at) >= force_check_interval,
    };

    Classification {
        ip_changed,
        force_check_due,
    }
}
