// # sgsyncd - Security Group IP Sync
//
// Thin entry point. Each invocation runs exactly one reconciliation pass
// and exits; scheduling belongs to cron, a systemd timer, or a container
// restart policy. All sync logic lives in sgsync-core.
//
// The binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging (console, plus syslog when configured)
// 3. Wiring the HTTP resolver, file state store, and EC2 provider
// 4. Running one pass and mapping the result to an exit code
//
// ## Configuration
//
// ### Rule
// - `SECURITY_GROUP_ID`: Target security group (required)
// - `PORT`, `PROTOCOL`, `RULE_DESCRIPTION`: Managed rule shape
// - `FORCE_CHECK_HOURS`: Forced recheck interval (0 = every pass)
//
// ### Local State and IP Lookup
// - `SGSYNC_STATE_DIR`: Directory for `current_ip.txt` / `last_update.txt`
// - `SGSYNC_IP_URL`, `SGSYNC_IP_TIMEOUT_SECS`: "what is my IP" service
//
// ### AWS
// Region and credentials follow the standard AWS chain: `AWS_REGION`,
// `AWS_ACCESS_KEY_ID` and friends, `AWS_PROFILE` with `~/.aws/config` and
// `~/.aws/credentials`, container credentials, or the instance role.
// There is no default region.
// - `SGSYNC_EC2_ENDPOINT`: Endpoint override
// - `SGSYNC_MODE`: `live` or `dry-run`
//
// ### Logging
// - `SGSYNC_LOG_LEVEL`: trace, debug, info, warn, error
// - `SYSLOG_SERVER`, `SYSLOG_PORT`: Optional UDP syslog sink
//
// ## Example
//
// ```bash
// export SECURITY_GROUP_ID=sg-0123456789abcdef0
// export AWS_PROFILE=prod
//
// sgsyncd
// ```

mod config;
mod syslog;

use anyhow::Result;
use sgsync_core::{FileStateStore, MemoryStateStore, PassOutcome, Reconciler, StateStore};
use sgsync_ip_http::HttpIpResolver;
use sgsync_provider_aws::{AwsEnvironment, Ec2SecurityGroupProvider};
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use config::Config;
use syslog::SyslogMakeWriter;

/// Process exit codes
///
/// - 0: the pass succeeded (skip, confirm, or replace)
/// - 1: configuration error, failed pass, or panic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SgsyncExitCode {
    Success = 0,
    Failure = 1,
}

impl From<SgsyncExitCode> for ExitCode {
    fn from(code: SgsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SgsyncExitCode::Failure.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SgsyncExitCode::Failure.into();
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SgsyncExitCode::Failure.into();
    }

    info!(
        group_id = %config.sync.security_group_id,
        mode = if config.dry_run { "DRY-RUN" } else { "LIVE" },
        "Starting sgsyncd"
    );
    if let Ok(json) = serde_json::to_string(&config.sync) {
        debug!(config = %json, "Rule configuration");
    }

    // One pass never needs more than one thread
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SgsyncExitCode::Failure.into();
        }
    };

    let code = exit_code_guarded(|| {
        rt.block_on(async {
            match run_once(&config).await {
                Ok(outcome) => {
                    log_outcome(&outcome);
                    SgsyncExitCode::Success
                }
                Err(e) => {
                    error!("Pass failed: {:#}", e);
                    SgsyncExitCode::Failure
                }
            }
        })
    });

    code.into()
}

/// Run `pass`, turning a panic into a failed pass instead of exit code 101
fn exit_code_guarded<F>(pass: F) -> SgsyncExitCode
where
    F: FnOnce() -> SgsyncExitCode,
{
    match panic::catch_unwind(AssertUnwindSafe(pass)) {
        Ok(code) => code,
        Err(_) => {
            error!("Pass aborted by panic");
            SgsyncExitCode::Failure
        }
    }
}

/// Resolve AWS settings, wire the components, and run a single pass
async fn run_once(config: &Config) -> Result<PassOutcome> {
    let aws = AwsEnvironment::load().await?;
    info!(region = aws.region(), "AWS environment loaded");

    let reconciler = build_reconciler(config, &aws).await?;
    Ok(reconciler.run_pass().await?)
}

async fn build_reconciler(config: &Config, aws: &AwsEnvironment) -> Result<Reconciler> {
    let resolver = HttpIpResolver::new(&config.ip_url, config.ip_timeout)?;

    // A dry run reads the real cache but must not record a change it never made
    let file_store = FileStateStore::new(&config.state_dir);
    let state_store: Box<dyn StateStore> = if config.dry_run {
        Box::new(MemoryStateStore::with_state(file_store.read_state().await))
    } else {
        Box::new(file_store)
    };

    let mut provider =
        Ec2SecurityGroupProvider::new(&config.sync.security_group_id, aws, config.dry_run)?;
    if let Some(endpoint) = &config.ec2_endpoint {
        provider = provider.with_endpoint(endpoint)?;
    }
    debug!(provider = ?provider, "EC2 provider ready");

    // Same instance serves as inspector and mutator
    let provider = Arc::new(provider);

    Ok(Reconciler::new(
        config.sync.clone(),
        Box::new(resolver),
        state_store,
        provider.clone(),
        provider,
    )?)
}

fn log_outcome(outcome: &PassOutcome) {
    match outcome {
        PassOutcome::Skipped { ip } => {
            info!(current_ip = %ip, action = outcome.action(), "Pass complete");
        }
        PassOutcome::Confirmed { ip, ip_changed } => {
            info!(
                current_ip = %ip,
                ip_changed,
                action = outcome.action(),
                "Pass complete"
            );
        }
        PassOutcome::Replaced {
            ip,
            previous_ip,
            stale_removed,
        } => {
            info!(
                current_ip = %ip,
                previous_ip = ?previous_ip,
                stale_removed,
                action = outcome.action(),
                "Pass complete"
            );
        }
    }
}

/// Install the console subscriber, plus the syslog sink when configured
fn init_tracing(config: &Config) -> Result<()> {
    let level = parse_level(&config.log_level);

    let (syslog_writer, syslog_error) = match &config.syslog {
        Some(target) => match SyslogMakeWriter::connect(target) {
            Ok(writer) => (Some(writer), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };

    let syslog_layer = syslog_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .without_time()
    });

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(fmt::layer())
        .with(syslog_layer)
        .try_init()?;

    if let Some(target) = &config.syslog {
        match syslog_error {
            None => info!(server = %target.host, port = target.port, "Syslog enabled"),
            Some(e) => warn!(
                server = %target.host,
                port = target.port,
                error = %e,
                "Failed to setup syslog"
            ),
        }
    }

    Ok(())
}

fn parse_level(raw: &str) -> Level {
    match raw.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
