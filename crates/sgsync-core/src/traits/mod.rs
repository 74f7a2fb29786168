//! Core traits for the sync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpResolver`]: Look up the current public IPv4 address
//! - [`StateStore`]: Local cache of the last known IP and last verification time
//! - [`RuleInspector`]: Read the live security group rule set
//! - [`RuleMutator`]: Authorize or revoke the managed CIDR

pub mod firewall;
pub mod ip_resolver;
pub mod state_store;

pub use firewall::{RuleInspector, RuleMutator};
pub use ip_resolver::IpResolver;
pub use state_store::{PersistedState, StateStore};
