//! Wall-clock seam for the reconciler
//!
//! Forced-recheck timing depends on "now", so the reconciler reads it
//! through [`Clock`] and tests substitute a clock they control.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
