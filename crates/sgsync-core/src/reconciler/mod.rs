//! Reconciliation engine
//!
//! The Reconciler runs exactly one pass per call:
//! - Resolves the current public IP
//! - Loads cached state
//! - Classifies the pass (IP changed? forced recheck due?)
//! - Skips, confirms, or replaces the managed CIDR
//! - Persists the outcome
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐
//! │ IpResolver  │      │ StateStore  │
//! │ (resolve)   │      │ (read)      │
//! └─────────────┘      └─────────────┘
//!        │                    │
//!        └────────┬───────────┘
//!                 ▼
//!          ┌─────────────┐
//!          │ Reconciler  │── SKIP ──▶ done
//!          └─────────────┘
//!                 │
//!        ┌────────┴───────────┐
//!        ▼                    ▼
//! ┌──────────────┐    ┌──────────────┐
//! │RuleInspector │    │ RuleMutator  │
//! │ (snapshot)   │    │ (remove/add) │
//! └──────────────┘    └──────────────┘
//!                 │
//!                 ▼
//!          ┌─────────────┐
//!          │ StateStore  │
//!          │ (write)     │
//!          └─────────────┘
//! ```
//!
//! ## Failure Policy
//!
//! | Where                | Effect                                          |
//! |----------------------|-------------------------------------------------|
//! | resolve              | pass fails, nothing else attempted              |
//! | inspect              | logged, treated as "rule absent" (re-add)       |
//! | remove stale CIDR    | logged, pass continues                          |
//! | add current CIDR     | pass fails, state left as it was                |
//! | persist              | logged, pass outcome unchanged                  |

mod classify;

pub use classify::{Classification, classify};

use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::traits::{IpResolver, RuleInspector, RuleMutator, StateStore};

/// What a successful pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// IP unchanged and recently verified; no remote calls were made
    Skipped { ip: Ipv4Addr },

    /// The current IP was already authorized remotely; nothing was mutated
    Confirmed { ip: Ipv4Addr, ip_changed: bool },

    /// The current IP was added, after revoking the previous one if needed
    Replaced {
        ip: Ipv4Addr,
        previous_ip: Option<Ipv4Addr>,
        stale_removed: bool,
    },
}

impl PassOutcome {
    /// Log-friendly action name
    pub fn action(&self) -> &'static str {
        match self {
            PassOutcome::Skipped { .. } => "skip",
            PassOutcome::Confirmed { .. } => "confirm",
            PassOutcome::Replaced { .. } => "replace",
        }
    }
}

/// Core reconciliation engine
///
/// Construct once per invocation with [`Reconciler::new()`] and call
/// [`Reconciler::run_pass()`]. The reconciler holds no state between passes;
/// everything it knows about earlier runs comes from the [`StateStore`].
///
/// ## Concurrency
///
/// A pass awaits each collaborator in turn and never runs two remote calls
/// at once. Overlapping passes against the same group are not guarded here
/// and are expected to be prevented by the scheduler.
pub struct Reconciler {
    config: SyncConfig,

    resolver: Box<dyn IpResolver>,

    state_store: Box<dyn StateStore>,

    inspector: Arc<dyn RuleInspector>,

    mutator: Arc<dyn RuleMutator>,

    clock: Box<dyn Clock>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// `inspector` and `mutator` are usually two handles to the same
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if `config` does not
    /// validate.
    pub fn new(
        config: SyncConfig,
        resolver: Box<dyn IpResolver>,
        state_store: Box<dyn StateStore>,
        inspector: Arc<dyn RuleInspector>,
        mutator: Arc<dyn RuleMutator>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            resolver,
            state_store,
            inspector,
            mutator,
            clock: Box::new(SystemClock),
        })
    }

    /// Replace the wall clock (tests and simulations)
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration this reconciler was built with
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(PassOutcome)`: the security group authorizes the current IP (or
    ///   was recently verified to)
    /// - `Err(Error)`: the IP could not be resolved, or the add failed
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        info!(group_id = %self.config.security_group_id, "Starting IP check");

        // RESOLVE
        let current_ip = match self.resolver.resolve().await {
            Ok(ip) => ip,
            Err(e) => {
                error!(
                    resolver = self.resolver.resolver_name(),
                    error = %e,
                    "Failed to get current public IP"
                );
                return Err(e);
            }
        };
        info!(current_ip = %current_ip, "Current public IP resolved");

        // LOAD
        let state = self.state_store.read_state().await;
        debug!(
            last_known_ip = ?state.last_known_ip,
            last_verified_at = ?state.last_verified_at,
            "Loaded cached state"
        );

        // CLASSIFY
        let classification = classify(
            current_ip,
            &state,
            self.clock.now_utc(),
            self.config.force_check_interval(),
        );

        if !classification.needs_inspection() {
            info!(
                current_ip = %current_ip,
                action = "skip",
                "IP unchanged and no force check needed, skipping API calls"
            );
            return Ok(PassOutcome::Skipped { ip: current_ip });
        }

        if classification.ip_changed {
            info!(
                previous_ip = ?state.last_known_ip,
                current_ip = %current_ip,
                "IP changed"
            );
        }
        if classification.force_check_due {
            info!(
                last_verified_at = ?state.last_verified_at,
                force_check_hours = self.config.force_check_hours,
                "Performing forced security group verification"
            );
        }

        // DECIDE
        let spec = self.config.rule_for(current_ip);
        if self.is_authorized(&spec).await {
            info!(rule = %spec, action = "confirm", "IP already exists in security group");
            let new_ip = classification.ip_changed.then_some(current_ip);
            self.persist(new_ip).await;
            return Ok(PassOutcome::Confirmed {
                ip: current_ip,
                ip_changed: classification.ip_changed,
            });
        }

        info!(rule = %spec, action = "replace", "IP not found in security group, updating");

        let previous_ip = state.last_known_ip.filter(|ip| *ip != current_ip);
        let stale_removed = match previous_ip {
            Some(old_ip) => self.remove_stale(old_ip).await,
            None => false,
        };

        info!(rule = %spec, "Adding new IP");
        if let Err(e) = self.mutator.add_rule(&spec).await {
            error!(
                rule = %spec,
                provider = self.mutator.provider_name(),
                error = %e,
                "Failed to add new IP"
            );
            return Err(e);
        }
        info!(rule = %spec, group_id = %self.config.security_group_id, "IP added to security group");

        self.persist(Some(current_ip)).await;
        info!(current_ip = %current_ip, "IP update completed successfully");

        Ok(PassOutcome::Replaced {
            ip: current_ip,
            previous_ip,
            stale_removed,
        })
    }

    /// Inspect the remote rule set, failing open
    ///
    /// An inspection error reads as "not authorized" so the pass re-adds the
    /// rule instead of trusting an unverified cache.
    async fn is_authorized(&self, spec: &crate::rules::RuleMatchSpec) -> bool {
        match self.inspector.exists(spec).await {
            Ok(found) => {
                debug!(rule = %spec, found, "Inspected security group");
                found
            }
            Err(e) => {
                error!(
                    rule = %spec,
                    provider = self.inspector.provider_name(),
                    error = %e,
                    "Error checking IP in security group, treating as absent"
                );
                false
            }
        }
    }

    /// Revoke the previously managed CIDR; failures are non-fatal
    async fn remove_stale(&self, old_ip: Ipv4Addr) -> bool {
        let stale = self.config.rule_for(old_ip);
        info!(rule = %stale, "Removing old IP");

        match self.mutator.remove_rule(&stale).await {
            Ok(()) => {
                info!(rule = %stale, group_id = %self.config.security_group_id, "IP removed from security group");
                true
            }
            Err(e) => {
                warn!(
                    rule = %stale,
                    provider = self.mutator.provider_name(),
                    error = %e,
                    "Error removing old IP, leaving stale rule in place"
                );
                false
            }
        }
    }

    /// Record a verified pass; failures are logged and swallowed
    async fn persist(&self, new_ip: Option<Ipv4Addr>) {
        if let Some(ip) = new_ip
            && let Err(e) = self.state_store.write_ip(ip).await
        {
            error!(ip = %ip, kind = e.kind(), error = %e, "Error saving IP to state");
        }

        let verified_at = self.clock.now_utc();
        if let Err(e) = self.state_store.write_verified_at(verified_at).await {
            error!(kind = e.kind(), error = %e, "Error saving verification timestamp");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_actions() {
        let ip = Ipv4Addr::new(192, 0, 2, 1);
        assert_eq!(PassOutcome::Skipped { ip }.action(), "skip");
        assert_eq!(
            PassOutcome::Confirmed {
                ip,
                ip_changed: false
            }
            .action(),
            "confirm"
        );
        assert_eq!(
            PassOutcome::Replaced {
                ip,
                previous_ip: None,
                stale_removed: false
            }
            .action(),
            "replace"
        );
    }
}
