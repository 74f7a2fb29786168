//! AWS region and credential discovery
//!
//! Both come from the SDK's default provider chain: environment variables,
//! the shared `~/.aws/config` and `~/.aws/credentials` files (honouring
//! `AWS_PROFILE`), web identity tokens, container credentials, and finally
//! the EC2 instance metadata service. There is no built-in region fallback;
//! a host with no region configured anywhere is a configuration error.

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use sgsync_core::{Error, Result};

pub use aws_credential_types::Credentials;

/// Region and credentials provider for one run
#[derive(Clone)]
pub struct AwsEnvironment {
    region: String,
    credentials: SharedCredentialsProvider,
}

impl AwsEnvironment {
    /// Resolve region and credentials through the default chain
    ///
    /// Credentials are fetched once here so a host without any fails before
    /// the pass starts. The provider caches them and refreshes expiring
    /// instance-role credentials on later calls.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no region is configured or no source in
    /// the chain yields credentials.
    pub async fn load() -> Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let env = Self::from_sdk_config(&sdk_config)?;

        let credentials = env.credentials().await?;
        tracing::debug!(
            region = %env.region,
            access_key_id = credentials.access_key_id(),
            "AWS credentials resolved"
        );
        Ok(env)
    }

    /// Take region and credentials provider from an already loaded SDK config
    pub fn from_sdk_config(config: &SdkConfig) -> Result<Self> {
        let region = config
            .region()
            .map(|r| r.as_ref().to_string())
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| {
                Error::config(
                    "No AWS region configured. \
                    Set AWS_REGION or add a region to the active profile",
                )
            })?;

        let credentials = config
            .credentials_provider()
            .ok_or_else(|| Error::config("No AWS credentials provider configured"))?;

        Ok(Self {
            region,
            credentials,
        })
    }

    /// Fixed region and fixed credentials
    pub fn with_static(region: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            region: region.into(),
            credentials: SharedCredentialsProvider::new(credentials),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn credentials_provider(&self) -> &SharedCredentialsProvider {
        &self.credentials
    }

    /// Current credentials from the provider (cached by the SDK)
    pub async fn credentials(&self) -> Result<Credentials> {
        self.credentials
            .provide_credentials()
            .await
            .map_err(|e| Error::config(format!("No usable AWS credentials: {}", e)))
    }
}

// The provider is opaque; region is all there is to show
impl std::fmt::Debug for AwsEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsEnvironment")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
