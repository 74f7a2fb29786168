// # EC2 Response Decoding
//
// The Query API answers in XML. Lists are wrapped as `<set><item/>...</set>`,
// and failures use a separate `<Response><Errors>` document regardless of
// the action. Unknown elements are ignored.

use serde::Deserialize;
use sgsync_core::rules::{IngressRule, SecurityGroupSnapshot};

/// An EC2 `<xxxSet><item>..</item></xxxSet>` list
#[derive(Debug, Deserialize)]
pub struct ItemList<T> {
    #[serde(rename = "item", default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Default for ItemList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeSecurityGroupsResponse {
    #[serde(default)]
    pub security_group_info: ItemList<SecurityGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    pub group_id: String,

    #[serde(default)]
    pub ip_permissions: ItemList<IpPermission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpPermission {
    pub ip_protocol: String,

    // Absent when the protocol is "-1"
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,

    #[serde(default)]
    pub ip_ranges: ItemList<IpRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRange {
    pub cidr_ip: String,
}

/// Body of a successful Authorize/Revoke call
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    #[serde(rename = "return", default)]
    pub accepted: Option<bool>,

    /// Revoke only: permissions that matched nothing in the group
    #[serde(default)]
    pub unknown_ip_permission_set: ItemList<IpPermission>,
}

/// `<Response><Errors><Error>` document
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Errors", default)]
    pub errors: ErrorList,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorList {
    #[serde(rename = "Error", default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "Code")]
    pub code: String,

    #[serde(rename = "Message", default)]
    pub message: String,
}

impl ErrorResponse {
    /// First error in the document, if any
    pub fn first(&self) -> Option<&ErrorDetail> {
        self.errors.errors.first()
    }
}

/// Decode an XML body
pub fn parse<'de, T: Deserialize<'de>>(body: &'de str) -> Result<T, quick_xml::DeError> {
    quick_xml::de::from_str(body)
}

impl SecurityGroup {
    /// Convert the wire shape into the core snapshot
    pub fn into_snapshot(self) -> SecurityGroupSnapshot {
        let ingress = self
            .ip_permissions
            .items
            .into_iter()
            .map(|perm| IngressRule {
                protocol: perm.ip_protocol,
                from_port: perm.from_port,
                to_port: perm.to_port,
                cidrs: perm.ip_ranges.items.into_iter().map(|r| r.cidr_ip).collect(),
            })
            .collect();

        SecurityGroupSnapshot::new(self.group_id, ingress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgsync_core::rules::RuleMatchSpec;
    use std::net::Ipv4Addr;

    const DESCRIBE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DescribeSecurityGroupsResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>59dbff89-35bd-4eac-99ed-be587EXAMPLE</requestId>
    <securityGroupInfo>
        <item>
            <ownerId>123456789012</ownerId>
            <groupId>sg-0123456789abcdef0</groupId>
            <groupName>bastion</groupName>
            <groupDescription>bastion access</groupDescription>
            <vpcId>vpc-1a2b3c4d</vpcId>
            <ipPermissions>
                <item>
                    <ipProtocol>tcp</ipProtocol>
                    <fromPort>22</fromPort>
                    <toPort>22</toPort>
                    <groups/>
                    <ipRanges>
                        <item>
                            <cidrIp>198.51.100.1/32</cidrIp>
                            <description>Dynamic IP access</description>
                        </item>
                        <item>
                            <cidrIp>10.0.0.0/8</cidrIp>
                        </item>
                    </ipRanges>
                    <ipv6Ranges/>
                    <prefixListIds/>
                </item>
                <item>
                    <ipProtocol>-1</ipProtocol>
                    <groups/>
                    <ipRanges>
                        <item>
                            <cidrIp>192.0.2.0/24</cidrIp>
                        </item>
                    </ipRanges>
                    <ipv6Ranges/>
                    <prefixListIds/>
                </item>
            </ipPermissions>
            <ipPermissionsEgress>
                <item>
                    <ipProtocol>-1</ipProtocol>
                    <groups/>
                    <ipRanges>
                        <item>
                            <cidrIp>0.0.0.0/0</cidrIp>
                        </item>
                    </ipRanges>
                    <ipv6Ranges/>
                    <prefixListIds/>
                </item>
            </ipPermissionsEgress>
        </item>
    </securityGroupInfo>
</DescribeSecurityGroupsResponse>"#;

    #[test]
    fn describe_response_becomes_snapshot() {
        let response: DescribeSecurityGroupsResponse = parse(DESCRIBE).unwrap();
        assert_eq!(response.security_group_info.items.len(), 1);

        let group = response.security_group_info.items.into_iter().next().unwrap();
        let snapshot = group.into_snapshot();

        assert_eq!(snapshot.group_id, "sg-0123456789abcdef0");
        assert_eq!(snapshot.ingress.len(), 2, "egress rules are not ingress");
        assert_eq!(snapshot.ingress[0].from_port, Some(22));
        assert_eq!(
            snapshot.ingress[0].cidrs,
            vec!["198.51.100.1/32".to_string(), "10.0.0.0/8".to_string()]
        );
        assert_eq!(snapshot.ingress[1].protocol, "-1");
        assert_eq!(snapshot.ingress[1].from_port, None);

        let managed = RuleMatchSpec::new(
            "tcp",
            22,
            Ipv4Addr::new(198, 51, 100, 1),
            "Dynamic IP access",
        );
        assert!(snapshot.authorizes(&managed));
    }

    #[test]
    fn group_without_rules_parses() {
        let xml = r#"<DescribeSecurityGroupsResponse>
            <securityGroupInfo>
                <item>
                    <groupId>sg-0123456789abcdef0</groupId>
                    <ipPermissions/>
                </item>
            </securityGroupInfo>
        </DescribeSecurityGroupsResponse>"#;

        let response: DescribeSecurityGroupsResponse = parse(xml).unwrap();
        let group = response.security_group_info.items.into_iter().next().unwrap();
        assert!(group.into_snapshot().ingress.is_empty());
    }

    #[test]
    fn error_document_parses() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Errors>
        <Error>
            <Code>InvalidPermission.Duplicate</Code>
            <Message>the specified rule "peer: 198.51.100.1/32, TCP, from port: 22, to port: 22, ALLOW" already exists</Message>
        </Error>
    </Errors>
    <RequestID>b2dd8e7c-7f5e-4c35-8b8b-EXAMPLE</RequestID>
</Response>"#;

        let response: ErrorResponse = parse(xml).unwrap();
        let first = response.first().unwrap();
        assert_eq!(first.code, "InvalidPermission.Duplicate");
        assert!(first.message.contains("already exists"));
    }

    #[test]
    fn revoke_response_reports_unknown_permissions() {
        let xml = r#"<RevokeSecurityGroupIngressResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
    <requestId>59dbff89-35bd-4eac-99ed-be587EXAMPLE</requestId>
    <return>true</return>
    <unknownIpPermissionSet>
        <item>
            <ipProtocol>tcp</ipProtocol>
            <fromPort>22</fromPort>
            <toPort>22</toPort>
            <ipRanges>
                <item>
                    <cidrIp>198.51.100.1/32</cidrIp>
                </item>
            </ipRanges>
        </item>
    </unknownIpPermissionSet>
</RevokeSecurityGroupIngressResponse>"#;

        let response: MutationResponse = parse(xml).unwrap();
        assert_eq!(response.accepted, Some(true));
        assert_eq!(response.unknown_ip_permission_set.items.len(), 1);
    }

    #[test]
    fn authorize_response_parses() {
        let xml = r#"<AuthorizeSecurityGroupIngressResponse>
    <requestId>59dbff89-35bd-4eac-99ed-be587EXAMPLE</requestId>
    <return>true</return>
</AuthorizeSecurityGroupIngressResponse>"#;

        let response: MutationResponse = parse(xml).unwrap();
        assert_eq!(response.accepted, Some(true));
        assert!(response.unknown_ip_permission_set.items.is_empty());
    }
}
