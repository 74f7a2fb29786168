//! Test doubles and common utilities for reconciliation contract tests
//!
//! The doubles count every call so tests can assert not just the outcome of
//! a pass but exactly which remote operations it made.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use sgsync_core::error::{Error, Result};
use sgsync_core::rules::{IngressRule, RuleMatchSpec, SecurityGroupSnapshot};
use sgsync_core::traits::{IpResolver, PersistedState, RuleInspector, RuleMutator};
use sgsync_core::{Clock, MemoryStateStore, Reconciler, SyncConfig};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const GROUP_ID: &str = "sg-0123456789abcdef0";
pub const IP_A: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 1);
pub const IP_B: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 7);

pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339")
        .with_timezone(&Utc)
}

/// An IP resolver that returns a fixed address (or always fails)
#[derive(Clone)]
pub struct FixedResolver {
    ip: Option<Ipv4Addr>,
    calls: Arc<AtomicUsize>,
}

impl FixedResolver {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip: Some(ip),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            ip: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpResolver for FixedResolver {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ip
            .ok_or_else(|| Error::network("lookup timed out after 10s"))
    }

    fn resolver_name(&self) -> &'static str {
        "fixed"
    }
}

/// An in-memory security group that records every call
///
/// Clones share the same group and counters.
#[derive(Clone, Default)]
pub struct MockFirewall {
    authorized: Arc<Mutex<BTreeSet<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    snapshot_calls: Arc<AtomicUsize>,
    fail_inspect: Arc<AtomicBool>,
    fail_add: Arc<AtomicBool>,
    fail_remove: Arc<AtomicBool>,
}

impl MockFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `ips` authorized on tcp/22
    pub fn with_authorized(ips: &[Ipv4Addr]) -> Self {
        let firewall = Self::new();
        {
            let mut authorized = firewall.authorized.lock().unwrap();
            for ip in ips {
                authorized.insert(format!("{}/32", ip));
            }
        }
        firewall
    }

    pub fn fail_inspect(&self, fail: bool) {
        self.fail_inspect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    /// Delete a CIDR behind the tool's back
    pub fn revoke_out_of_band(&self, ip: Ipv4Addr) {
        self.authorized.lock().unwrap().remove(&format!("{}/32", ip));
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    /// Mutation calls in order, e.g. `["remove 198.51.100.1/32", "add 203.0.113.7/32"]`
    pub fn mutations(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn authorized(&self) -> Vec<String> {
        self.authorized.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait::async_trait]
impl RuleInspector for MockFirewall {
    async fn snapshot(&self) -> Result<SecurityGroupSnapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inspect.load(Ordering::SeqCst) {
            return Err(Error::api("mock", "RequestLimitExceeded"));
        }

        let cidrs = self.authorized.lock().unwrap().iter().cloned().collect();
        Ok(SecurityGroupSnapshot::new(
            GROUP_ID,
            vec![IngressRule {
                protocol: "tcp".to_string(),
                from_port: Some(22),
                to_port: Some(22),
                cidrs,
            }],
        ))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[async_trait::async_trait]
impl RuleMutator for MockFirewall {
    async fn add_rule(&self, spec: &RuleMatchSpec) -> Result<()> {
        self.calls.lock().unwrap().push(format!("add {}", spec.cidr()));
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Error::api("mock", "UnauthorizedOperation"));
        }
        self.authorized.lock().unwrap().insert(spec.cidr());
        Ok(())
    }

    async fn remove_rule(&self, spec: &RuleMatchSpec) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("remove {}", spec.cidr()));
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(Error::api("mock", "InternalError"));
        }
        self.authorized.lock().unwrap().remove(&spec.cidr());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock-writer"
    }
}

/// A clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// State cached by an earlier pass that saw `ip` at `verified_at`
pub fn cached(ip: Ipv4Addr, verified_at: &str) -> PersistedState {
    PersistedState {
        last_known_ip: Some(ip),
        last_verified_at: Some(at(verified_at)),
    }
}

/// Wire a reconciler for tcp/22 with a 24h forced recheck
pub fn reconciler(
    resolver: &FixedResolver,
    store: &MemoryStateStore,
    firewall: &MockFirewall,
    clock: &ManualClock,
) -> Reconciler {
    let firewall = Arc::new(firewall.clone());
    Reconciler::new(
        SyncConfig::new(GROUP_ID),
        Box::new(resolver.clone()),
        Box::new(store.clone()),
        firewall.clone(),
        firewall,
    )
    .expect("valid config")
    .with_clock(Box::new(clock.clone()))
}
