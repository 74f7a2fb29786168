// # sgsync-core
//
// Core library for keeping a single security group ingress rule pointed at
// the operator's current public IP.
//
// ## Architecture Overview
//
// - **IpResolver**: Trait for looking up the current public IPv4 address
// - **StateStore**: Trait for the local last-known-IP / last-verified cache
// - **RuleInspector**: Trait for reading the live security group rules
// - **RuleMutator**: Trait for authorizing and revoking a single CIDR
// - **Reconciler**: Decision engine that runs one pass over the above
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic lives here, I/O lives in plugin crates
// 2. **Single Pass**: One invocation is one reconciliation pass, no background work
// 3. **Remote Is Authoritative**: Local state is only a cache to avoid API calls
// 4. **Library-First**: The daemon is a thin wrapper around this crate

pub mod clock;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod rules;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, SystemClock};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use reconciler::{PassOutcome, Reconciler};
pub use rules::{IngressRule, RuleMatchSpec, SecurityGroupSnapshot};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{IpResolver, PersistedState, RuleInspector, RuleMutator, StateStore};
