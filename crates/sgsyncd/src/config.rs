// # Daemon Configuration
//
// Everything the binary needs, read once from environment variables.
// Parsing goes through a lookup function so tests never touch the real
// process environment.

use anyhow::{Context, Result};
use sgsync_core::SyncConfig;
use sgsync_core::config::{
    DEFAULT_DESCRIPTION, DEFAULT_FORCE_CHECK_HOURS, DEFAULT_PORT, DEFAULT_PROTOCOL,
};
use sgsync_ip_http::{DEFAULT_IP_URL, DEFAULT_TIMEOUT};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default state directory (a mounted volume in container deployments)
pub const DEFAULT_STATE_DIR: &str = "/data";

/// Default syslog port
pub const DEFAULT_SYSLOG_PORT: u16 = 514;

/// Remote syslog destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogTarget {
    pub host: String,
    pub port: u16,
}

/// Application configuration
#[derive(Debug)]
pub struct Config {
    pub sync: SyncConfig,
    pub state_dir: PathBuf,
    pub ip_url: String,
    pub ip_timeout: Duration,
    pub ec2_endpoint: Option<String>,
    pub dry_run: bool,
    pub log_level: String,
    pub syslog: Option<SyslogTarget>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let security_group_id = get("SECURITY_GROUP_ID").context(
            "SECURITY_GROUP_ID is required. \
            Set it via: export SECURITY_GROUP_ID=sg-0123456789abcdef0",
        )?;

        let sync = SyncConfig {
            security_group_id,
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            protocol: get("PROTOCOL").unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            description: get("RULE_DESCRIPTION")
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            force_check_hours: parse_or(&get, "FORCE_CHECK_HOURS", DEFAULT_FORCE_CHECK_HOURS)?,
        };

        let mode = get("SGSYNC_MODE").unwrap_or_else(|| "live".to_string());
        let dry_run = match mode.to_lowercase().as_str() {
            "live" => false,
            "dry-run" | "dryrun" | "dry_run" => true,
            _ => anyhow::bail!(
                "SGSYNC_MODE '{}' is not valid. Valid modes: live, dry-run",
                mode
            ),
        };

        let syslog = match get("SYSLOG_SERVER") {
            Some(host) => Some(SyslogTarget {
                host,
                port: parse_or(&get, "SYSLOG_PORT", DEFAULT_SYSLOG_PORT)?,
            }),
            None => None,
        };

        Ok(Self {
            sync,
            state_dir: get("SGSYNC_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
            ip_url: get("SGSYNC_IP_URL").unwrap_or_else(|| DEFAULT_IP_URL.to_string()),
            ip_timeout: Duration::from_secs(parse_or(
                &get,
                "SGSYNC_IP_TIMEOUT_SECS",
                DEFAULT_TIMEOUT.as_secs(),
            )?),
            ec2_endpoint: get("SGSYNC_EC2_ENDPOINT"),
            dry_run,
            log_level: get("SGSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            syslog,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        if self.ip_timeout.is_zero() || self.ip_timeout > Duration::from_secs(300) {
            anyhow::bail!(
                "SGSYNC_IP_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.ip_timeout.as_secs()
            );
        }

        if !self.ip_url.starts_with("https://") && !self.ip_url.starts_with("http://") {
            anyhow::bail!(
                "SGSYNC_IP_URL must use HTTP or HTTPS scheme. Got: {}",
                self.ip_url
            );
        }

        if let Some(syslog) = &self.syslog
            && syslog.port == 0
        {
            anyhow::bail!("SYSLOG_PORT must be between 1 and 65535");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SGSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional numeric variable; a present but unparsable value is an error
fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
