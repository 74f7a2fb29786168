//! Configuration types for the sync system
//!
//! The reconciler receives a [`SyncConfig`] at construction and never reads
//! the environment itself. Environment parsing lives in the daemon.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::rules::RuleMatchSpec;

/// Default port the managed rule opens
pub const DEFAULT_PORT: u16 = 22;

/// Default rule protocol
pub const DEFAULT_PROTOCOL: &str = "tcp";

/// Default description attached to the managed CIDR entry
pub const DEFAULT_DESCRIPTION: &str = "Dynamic IP access";

/// Default forced recheck interval
pub const DEFAULT_FORCE_CHECK_HOURS: u64 = 24;

/// Immutable settings for one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Target security group (e.g. "sg-0123456789abcdef0")
    pub security_group_id: String,

    /// Port opened by the managed rule (from_port == to_port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Rule protocol ("tcp", "udp", "icmp" or an IANA protocol number)
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Description attached to the CIDR entry on add
    #[serde(default = "default_description")]
    pub description: String,

    /// Hours after which the remote rule set is re-inspected even if the IP
    /// looks unchanged. Zero means every pass inspects.
    #[serde(default = "default_force_check_hours")]
    pub force_check_hours: u64,
}

impl SyncConfig {
    /// Create a configuration for the given group with all defaults
    pub fn new(security_group_id: impl Into<String>) -> Self {
        Self {
            security_group_id: security_group_id.into(),
            port: DEFAULT_PORT,
            protocol: DEFAULT_PROTOCOL.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            force_check_hours: DEFAULT_FORCE_CHECK_HOURS,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.security_group_id.trim().is_empty() {
            return Err(crate::Error::config("Security group ID is required"));
        }

        if !self.security_group_id.starts_with("sg-") {
            return Err(crate::Error::config(format!(
                "Security group ID must start with 'sg-'. Got: {}",
                self.security_group_id
            )));
        }

        if self.port == 0 {
            return Err(crate::Error::config("Port must be between 1 and 65535"));
        }

        match self.protocol.as_str() {
            "tcp" | "udp" | "icmp" => {}
            other => {
                if other.parse::<u8>().is_err() {
                    return Err(crate::Error::config(format!(
                        "Protocol '{}' is not supported. \
                        Use tcp, udp, icmp or a protocol number (0-255)",
                        other
                    )));
                }
            }
        }

        if self.description.len() > 255 {
            return Err(crate::Error::config(format!(
                "Rule description too long: {} chars (max 255)",
                self.description.len()
            )));
        }

        Ok(())
    }

    /// Forced recheck interval as a chrono duration
    pub fn force_check_interval(&self) -> chrono::Duration {
        let hours = i64::try_from(self.force_check_hours).unwrap_or(i64::MAX / 3600);
        chrono::Duration::try_hours(hours).unwrap_or(chrono::Duration::MAX)
    }

    /// Build the match spec for a given address
    pub fn rule_for(&self, ip: Ipv4Addr) -> RuleMatchSpec {
        RuleMatchSpec::new(&self.protocol, self.port, ip, &self.description)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_force_check_hours() -> u64 {
    DEFAULT_FORCE_CHECK_HOURS
}
