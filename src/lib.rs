//! dialcache: DNS caching and failover dialing for HTTP/TCP clients
//!
//! # Features
//!
//! - **Background-refreshed DNS cache**: hostname lookups are answered from
//!   memory, with every known host re-resolved on a fixed interval
//! - **Stale over nothing**: a failed refresh keeps the previous addresses
//! - **Randomized failover dialing**: addresses behind a hostname are tried in
//!   random order until one connects; the first failure is reported verbatim
//! - **Pluggable strategies**: resolver, connector and address ordering are
//!   all injectable
//! - **reqwest integration**: use the cache as a client's DNS resolver
//!
//! # Quick Start
//!
//! ```no_run
//! use dialcache::{DnsCache, FailoverDialer, TcpConnector};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(DnsCache::new(Duration::from_secs(30), Duration::from_secs(5))?);
//!     let dialer = FailoverDialer::new(cache.clone(), TcpConnector::new());
//!
//!     let ctx = CancellationToken::new();
//!     let stream = dialer.dial(&ctx, "tcp", "example.com:443").await?;
//!     println!("Connected to {}", stream.peer_addr()?);
//!
//!     cache.stop();
//!     Ok(())
//! }
//! ```
//!
//! # HTTP clients
//!
//! ```no_run
//! use dialcache::{create_cached_client, DnsCache, DnsCacheConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(DnsCache::from_config(DnsCacheConfig::from_env()?)?);
//!     let client = create_cached_client(cache.clone())?;
//!
//!     let body = client.get("https://example.com/").send().await?.text().await?;
//!     println!("{} bytes", body.len());
//!
//!     cache.stop();
//!     Ok(())
//! }
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;

// Global constants
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Initialize logging, honouring `RUST_LOG`. Does nothing if a global
/// subscriber is already installed.
pub fn init() {
    let initialized = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .is_ok();
    if initialized {
        info!("dialcache initialized");
    }
}

// Re-export main types
pub use crate::config::DnsCacheConfig;
pub use crate::dialer::{
    join_host_port, Connector, DialTarget, FailoverDialer, Permute, RandomPermutation,
    TcpConnector,
};
pub use crate::dns_cache::{Addresses, DnsCache};
pub use crate::resolver::{HickoryResolver, LookupHost, SystemResolver};

// Re-export error types
pub use crate::errors::{ConfigError, DialError, ResolutionError, Result};

// Re-export HTTP integration
pub use crate::http_config::{cached_client_builder, create_cached_client, CachedResolver};

// Module declarations
pub mod config;
pub mod dialer;
pub mod dns_cache;
pub mod errors;
pub mod http_config;
pub mod resolver;
