//! Contract Test: SKIP Idempotence
//!
//! When the IP is unchanged and the last verification is younger than the
//! forced recheck interval, a pass must not touch the remote API or the
//! cached state, no matter how often it runs.

mod common;

use chrono::Duration;
use common::*;
use sgsync_core::{MemoryStateStore, PassOutcome};

#[tokio::test]
async fn repeated_passes_make_no_remote_calls() {
    let resolver = FixedResolver::new(IP_A);
    let store = MemoryStateStore::with_state(cached(IP_A, "2025-03-01T00:00:00Z"));
    let firewall = MockFirewall::with_authorized(&[IP_A]);
    let clock = ManualClock::new(at("2025-03-01T06:00:00Z"));

    let reconciler = reconciler(&resolver, &store, &firewall, &clock);

    for _ in 0..3 {
        let outcome = reconciler.run_pass().await.expect("skip succeeds");
        assert_eq!(outcome, PassOutcome::Skipped { ip: IP_A });
        clock.advance(Duration::hours(1));
    }

    assert_eq!(resolver.call_count(), 3, "IP is resolved on every pass");
    assert_eq!(firewall.snapshot_count(), 0, "no inspection while fresh");
    assert!(firewall.mutations().is_empty(), "no mutation while fresh");
    assert_eq!(store.write_count(), 0, "skip never writes state");
    assert_eq!(
        store.snapshot().await,
        cached(IP_A, "2025-03-01T00:00:00Z")
    );
}

#[tokio::test]
async fn skip_holds_until_just_before_the_interval() {
    let resolver = FixedResolver::new(IP_A);
    let store = MemoryStateStore::with_state(cached(IP_A, "2025-03-01T00:00:00Z"));
    let firewall = MockFirewall::with_authorized(&[IP_A]);
    let clock = ManualClock::new(at("2025-03-01T23:59:59Z"));

    let outcome = reconciler(&resolver, &store, &firewall, &clock)
        .run_pass()
        .await
        .unwrap();

    assert_eq!(outcome.action(), "skip");
    assert_eq!(firewall.snapshot_count(), 0);
}
