//! Rule model and matching
//!
//! A [`SecurityGroupSnapshot`] is what a [`RuleInspector`](crate::RuleInspector)
//! returns: a read-only copy of the group's ingress rules at one instant.
//! Whether the managed CIDR is present is decided here, not in the provider,
//! so every provider shares the same exact-match semantics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// The single-address rule the reconciler manages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatchSpec {
    pub protocol: String,
    pub port: u16,
    pub ip: Ipv4Addr,
    pub description: String,
}

impl RuleMatchSpec {
    pub fn new(protocol: &str, port: u16, ip: Ipv4Addr, description: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            port,
            ip,
            description: description.to_string(),
        }
    }

    /// Host CIDR for the address, always `<ip>/32`
    pub fn cidr(&self) -> String {
        host_cidr(self.ip)
    }
}

impl fmt::Display for RuleMatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} from {}", self.protocol, self.port, self.cidr())
    }
}

/// Format an address as a single-host CIDR
pub fn host_cidr(ip: Ipv4Addr) -> String {
    format!("{}/32", ip)
}

/// One ingress permission as reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: String,
    /// Absent for "all traffic" rules
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub cidrs: Vec<String>,
}

impl IngressRule {
    /// True when protocol and the exact single-port range match
    fn covers_port(&self, protocol: &str, port: u16) -> bool {
        let port = i32::from(port);
        self.protocol == protocol && self.from_port == Some(port) && self.to_port == Some(port)
    }
}

/// Ordered ingress rules of one security group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityGroupSnapshot {
    pub group_id: String,
    pub ingress: Vec<IngressRule>,
}

impl SecurityGroupSnapshot {
    pub fn new(group_id: impl Into<String>, ingress: Vec<IngressRule>) -> Self {
        Self {
            group_id: group_id.into(),
            ingress,
        }
    }

    /// Whether an entry with exactly (protocol, port == from == to, ip/32) exists
    pub fn authorizes(&self, spec: &RuleMatchSpec) -> bool {
        let cidr = spec.cidr();
        self.ingress
            .iter()
            .filter(|rule| rule.covers_port(&spec.protocol, spec.port))
            .any(|rule| rule.cidrs.iter().any(|c| *c == cidr))
    }

    /// All host CIDRs granted on the managed (protocol, port) pair
    pub fn cidrs_on(&self, protocol: &str, port: u16) -> Vec<&str> {
        self.ingress
            .iter()
            .filter(|rule| rule.covers_port(protocol, port))
            .flat_map(|rule| rule.cidrs.iter().map(String::as_str))
            .collect()
    }
}
