// # Firewall Traits
//
// Defines the interfaces for reading and changing the remote security group.
//
// ## Implementations
//
// - AWS EC2 security groups: `sgsync-provider-aws` crate
//
// A single provider type normally implements both traits; they are split so
// the reconciler's read path and write path can be doubled independently in
// tests.

use async_trait::async_trait;

use crate::rules::{RuleMatchSpec, SecurityGroupSnapshot};

/// Read side of the remote firewall
///
/// # Contract
///
/// - Every call queries the live API; nothing is cached between calls
/// - API failures are returned as [`Error::Api`](crate::Error::Api) and
///   transport failures as [`Error::Network`](crate::Error::Network).
///   Deciding what a failed inspection means is the reconciler's job.
#[async_trait]
pub trait RuleInspector: Send + Sync {
    /// Fetch the current ingress rules of the managed group
    async fn snapshot(&self) -> Result<SecurityGroupSnapshot, crate::Error>;

    /// Whether the exact rule in `spec` is currently present
    async fn exists(&self, spec: &RuleMatchSpec) -> Result<bool, crate::Error> {
        Ok(self.snapshot().await?.authorizes(spec))
    }

    /// Short name used in log lines
    fn provider_name(&self) -> &'static str;
}

/// Write side of the remote firewall
///
/// # Contract
///
/// - One request per call, no retries (the next scheduled pass is the retry)
/// - Idempotent: adding a CIDR that is already present, or removing one that
///   is already gone, returns `Ok(())`
/// - Other failures are returned as [`Error::Api`](crate::Error::Api)
#[async_trait]
pub trait RuleMutator: Send + Sync {
    /// Authorize `spec.cidr()` on (protocol, port) with `spec.description`
    async fn add_rule(&self, spec: &RuleMatchSpec) -> Result<(), crate::Error>;

    /// Revoke `spec.cidr()` on (protocol, port)
    async fn remove_rule(&self, spec: &RuleMatchSpec) -> Result<(), crate::Error>;

    /// Short name used in log lines
    fn provider_name(&self) -> &'static str;
}
