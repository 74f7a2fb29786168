//! EC2 Query API request bodies
//!
//! Every call is a form-encoded POST whose parameters name the action, the
//! API version, and the action's flattened arguments.

use sgsync_core::rules::RuleMatchSpec;

/// EC2 API version the request and response shapes follow
pub const API_VERSION: &str = "2016-11-15";

pub const DESCRIBE_SECURITY_GROUPS: &str = "DescribeSecurityGroups";
pub const AUTHORIZE_INGRESS: &str = "AuthorizeSecurityGroupIngress";
pub const REVOKE_INGRESS: &str = "RevokeSecurityGroupIngress";

/// Ordered request parameters for one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    action: &'static str,
    params: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            params: Vec::new(),
        }
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn push(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Ask EC2 to check permissions without applying the change
    pub fn dry_run(self) -> Self {
        self.push("DryRun", "true")
    }

    /// Look up a parameter by name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Form-encode into a request body
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("Action", self.action);
        serializer.append_pair("Version", API_VERSION);
        for (key, value) in &self.params {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// `DescribeSecurityGroups` for exactly one group
pub fn describe_group(group_id: &str) -> QueryParams {
    QueryParams::new(DESCRIBE_SECURITY_GROUPS).push("GroupId.1", group_id)
}

/// `AuthorizeSecurityGroupIngress` for one host CIDR, description included
pub fn authorize(group_id: &str, spec: &RuleMatchSpec) -> QueryParams {
    permission(AUTHORIZE_INGRESS, group_id, spec)
        .push("IpPermissions.1.IpRanges.1.Description", &spec.description)
}

/// `RevokeSecurityGroupIngress` for one host CIDR
///
/// Revocation matches on protocol, ports, and CIDR only.
pub fn revoke(group_id: &str, spec: &RuleMatchSpec) -> QueryParams {
    permission(REVOKE_INGRESS, group_id, spec)
}

fn permission(action: &'static str, group_id: &str, spec: &RuleMatchSpec) -> QueryParams {
    let port = spec.port.to_string();
    QueryParams::new(action)
        .push("GroupId", group_id)
        .push("IpPermissions.1.IpProtocol", &spec.protocol)
        .push("IpPermissions.1.FromPort", &port)
        .push("IpPermissions.1.ToPort", &port)
        .push("IpPermissions.1.IpRanges.1.CidrIp", spec.cidr())
}
