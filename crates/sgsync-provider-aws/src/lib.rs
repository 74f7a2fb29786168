// # AWS EC2 Security Group Provider
//
// This crate implements `RuleInspector` and `RuleMutator` against one EC2
// security group, speaking the EC2 Query API directly over HTTPS.
//
// ## Behavior
//
// - One HTTP request per trait call, no retries and no caching
// - Requests are signed with AWS Signature Version 4
// - Adding a rule that already exists and revoking a rule that is already
//   gone both succeed, so repeated passes converge
// - Dry-run mode inspects normally but sends mutations with `DryRun=true`,
//   which makes EC2 check permissions without applying the change
//
// ## Security Requirements
//
// - The secret key and session token never appear in logs or `Debug` output
// - Region and credentials come from the standard AWS provider chain
//   (environment, shared profile files, container or instance role)
//
// ## API Reference
//
// - DescribeSecurityGroups, AuthorizeSecurityGroupIngress,
//   RevokeSecurityGroupIngress (API version 2016-11-15)
// - Endpoint: `https://ec2.<region>.amazonaws.com/`

pub mod credentials;
pub mod query;
pub mod response;
pub mod sigv4;

pub use credentials::{AwsEnvironment, Credentials};

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use chrono::Utc;
use sgsync_core::rules::{RuleMatchSpec, SecurityGroupSnapshot};
use sgsync_core::traits::{RuleInspector, RuleMutator};
use sgsync_core::{Error, Result};
use std::time::Duration;
use url::Url;

use query::QueryParams;
use response::{DescribeSecurityGroupsResponse, ErrorResponse, MutationResponse};

/// Provider name used in errors and logs
pub const PROVIDER_NAME: &str = "aws-ec2";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const SERVICE: &str = "ec2";

/// Error code for an authorize that matches an existing rule
const DUPLICATE_PERMISSION: &str = "InvalidPermission.Duplicate";

/// Error code for a revoke that matches nothing
const PERMISSION_NOT_FOUND: &str = "InvalidPermission.NotFound";

/// Error code EC2 returns when a dry-run request would have succeeded
const DRY_RUN_OPERATION: &str = "DryRunOperation";

/// Failure of a single EC2 call, before it is folded into [`Error`]
#[derive(Debug, thiserror::Error)]
pub enum Ec2Error {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AWS credentials unavailable: {0}")]
    Credentials(String),

    #[error("{code}: {message} (HTTP {status})")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to parse {action} response: {reason}")]
    Malformed { action: &'static str, reason: String },
}

impl Ec2Error {
    /// EC2 error code, if the service returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            Ec2Error::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<Ec2Error> for Error {
    fn from(e: Ec2Error) -> Self {
        match e {
            Ec2Error::Transport(_) => Error::network(e.to_string()),
            other => Error::api(PROVIDER_NAME, other.to_string()),
        }
    }
}

/// EC2 security group provider
///
/// One instance manages one group. The daemon wraps it in an `Arc` and hands
/// the same instance to the reconciler as both inspector and mutator.
pub struct Ec2SecurityGroupProvider {
    group_id: String,

    region: String,

    endpoint: Url,

    credentials: SharedCredentialsProvider,

    client: reqwest::Client,

    /// Dry-run mode: inspect normally, ask EC2 to validate mutations only
    dry_run: bool,
}

// Custom Debug implementation that keeps the credentials out
impl std::fmt::Debug for Ec2SecurityGroupProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ec2SecurityGroupProvider")
            .field("group_id", &self.group_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint.as_str())
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Ec2SecurityGroupProvider {
    /// Create a provider for `group_id` in the region of `aws`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the region is empty or the HTTP client
    /// cannot be built.
    pub fn new(group_id: impl Into<String>, aws: &AwsEnvironment, dry_run: bool) -> Result<Self> {
        let region = aws.region().to_string();
        if region.trim().is_empty() {
            return Err(Error::config("AWS region cannot be empty"));
        }

        let endpoint = default_endpoint(&region)?;
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("sgsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            group_id: group_id.into(),
            region,
            endpoint,
            credentials: aws.credentials_provider().clone(),
            client,
            dry_run,
        })
    }

    /// Point the provider at a non-default endpoint (VPC endpoint, LocalStack)
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("Invalid EC2 endpoint {}: {}", endpoint, e)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(Error::config(format!(
                "EC2 endpoint must use HTTP or HTTPS scheme. Got: {}",
                endpoint
            )));
        }
        if url.host_str().is_none() {
            return Err(Error::config(format!("EC2 endpoint has no host: {}", endpoint)));
        }
        self.endpoint = url;
        Ok(self)
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Value of the `Host` header, as reqwest will send it
    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Sign and send one Query API call, returning the raw success body
    async fn call(&self, params: &QueryParams) -> std::result::Result<String, Ec2Error> {
        let action = params.action();
        let body = params.encode();
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| Ec2Error::Credentials(e.to_string()))?;
        let signed = sigv4::sign_form_post(
            &credentials,
            &self.region,
            SERVICE,
            &self.host_header(),
            body.as_bytes(),
            Utc::now(),
        );

        tracing::debug!(
            action,
            endpoint = %self.endpoint,
            dry_run = self.dry_run,
            "Calling EC2"
        );

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, sigv4::FORM_CONTENT_TYPE)
            .header("x-amz-date", &signed.amz_date)
            .header(reqwest::header::AUTHORIZATION, &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        Err(service_error(action, status.as_u16(), &text))
    }

    /// Run a mutation, mapping the "already in the desired state" code to success
    async fn mutate(
        &self,
        params: QueryParams,
        converged_code: &str,
    ) -> std::result::Result<Option<MutationResponse>, Ec2Error> {
        let params = if self.dry_run { params.dry_run() } else { params };
        let action = params.action();

        match self.call(&params).await {
            Ok(body) => {
                let parsed = response::parse::<MutationResponse>(&body).map_err(|e| {
                    Ec2Error::Malformed {
                        action,
                        reason: e.to_string(),
                    }
                })?;
                if parsed.accepted == Some(false) {
                    return Err(Ec2Error::Service {
                        status: 200,
                        code: "Rejected".to_string(),
                        message: format!("{} returned false", action),
                    });
                }
                Ok(Some(parsed))
            }
            Err(e) if e.code() == Some(DRY_RUN_OPERATION) => {
                tracing::info!(action, "[DRY-RUN] EC2 accepted the request; no change applied");
                Ok(None)
            }
            Err(e) if e.code() == Some(converged_code) => {
                tracing::debug!(action, code = converged_code, "Rule already in desired state");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RuleInspector for Ec2SecurityGroupProvider {
    async fn snapshot(&self) -> Result<SecurityGroupSnapshot> {
        let params = query::describe_group(&self.group_id);
        let body = self.call(&params).await?;

        let parsed: DescribeSecurityGroupsResponse =
            response::parse(&body).map_err(|e| Ec2Error::Malformed {
                action: params.action(),
                reason: e.to_string(),
            })?;

        let group = parsed
            .security_group_info
            .items
            .into_iter()
            .find(|g| g.group_id == self.group_id)
            .ok_or_else(|| {
                Error::api(
                    PROVIDER_NAME,
                    format!(
                        "InvalidGroup.NotFound: security group {} not in response",
                        self.group_id
                    ),
                )
            })?;

        let snapshot = group.into_snapshot();
        tracing::debug!(
            group_id = %snapshot.group_id,
            ingress_rules = snapshot.ingress.len(),
            "Described security group"
        );
        Ok(snapshot)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl RuleMutator for Ec2SecurityGroupProvider {
    async fn add_rule(&self, spec: &RuleMatchSpec) -> Result<()> {
        tracing::info!(
            rule = %spec,
            group_id = %self.group_id,
            mode = if self.dry_run { "DRY-RUN" } else { "LIVE" },
            "Authorizing ingress"
        );

        self.mutate(query::authorize(&self.group_id, spec), DUPLICATE_PERMISSION)
            .await?;
        Ok(())
    }

    async fn remove_rule(&self, spec: &RuleMatchSpec) -> Result<()> {
        tracing::info!(
            rule = %spec,
            group_id = %self.group_id,
            mode = if self.dry_run { "DRY-RUN" } else { "LIVE" },
            "Revoking ingress"
        );

        let response = self
            .mutate(query::revoke(&self.group_id, spec), PERMISSION_NOT_FOUND)
            .await?;

        if let Some(response) = response
            && !response.unknown_ip_permission_set.items.is_empty()
        {
            tracing::debug!(rule = %spec, "Rule was not present in the group");
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Regional endpoint for `region`
pub fn default_endpoint(region: &str) -> Result<Url> {
    let raw = format!("https://{}.{}.amazonaws.com/", SERVICE, region);
    Url::parse(&raw).map_err(|e| Error::config(format!("Invalid AWS region {}: {}", region, e)))
}

/// Build an [`Ec2Error::Service`] from a non-2xx response
fn service_error(action: &'static str, status: u16, body: &str) -> Ec2Error {
    if let Ok(doc) = response::parse::<ErrorResponse>(body)
        && let Some(detail) = doc.first()
    {
        return Ec2Error::Service {
            status,
            code: detail.code.clone(),
            message: detail.message.clone(),
        };
    }

    // No error document; fall back to the status class
    let (code, message) = match status {
        401 | 403 => (
            "AuthFailure",
            "Authentication failed: check AWS credentials and IAM permissions".to_string(),
        ),
        429 => (
            "RequestLimitExceeded",
            "Rate limit exceeded. Please retry later".to_string(),
        ),
        500..=599 => (
            "ServiceUnavailable",
            format!("EC2 server error (transient) during {}", action),
        ),
        _ => ("Unknown", format!("{} failed: {}", action, truncate(body, 200))),
    };

    Ec2Error::Service {
        status,
        code: code.to_string(),
        message,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
