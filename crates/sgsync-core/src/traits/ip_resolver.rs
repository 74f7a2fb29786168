// # IP Resolver Trait
//
// Defines the interface for looking up the caller's public IPv4 address.
//
// ## Implementations
//
// - HTTP "what is my IP" service: `sgsync-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use sgsync_core::IpResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* IpResolver implementation */;
//     let ip = resolver.resolve().await?;
//     println!("public IP: {}", ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP lookup implementations
///
/// A resolver makes exactly one lookup per call and never caches: the
/// reconciler calls it once per pass and needs the live answer.
///
/// # Errors
///
/// Every failure (timeout, DNS, non-2xx status, unparsable or non-IPv4
/// body) must be reported as [`Error::Network`](crate::Error::Network).
/// The reconciler aborts the pass on it, since no safe decision can be made
/// without the current address.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the current public IPv4 address
    async fn resolve(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Short name used in log lines
    fn resolver_name(&self) -> &'static str;
}
