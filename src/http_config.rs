//! HTTP client wiring for the DNS cache
//!
//! reqwest accepts a custom [`Resolve`] implementation. [`CachedResolver`]
//! answers it from a [`DnsCache`], shuffling the addresses on every call so
//! connections spread across all addresses behind a hostname, and the
//! connector fails over to the next address when one is unreachable.

use crate::dialer::{Permute, RandomPermutation};
use crate::dns_cache::DnsCache;
use crate::errors::ResolutionError;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{Client, ClientBuilder};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// reqwest resolver backed by a [`DnsCache`]
#[derive(Clone)]
pub struct CachedResolver {
    cache: Arc<DnsCache>,
    permute: Arc<dyn Permute>,
}

impl CachedResolver {
    pub fn new(cache: Arc<DnsCache>) -> Self {
        Self {
            cache,
            permute: Arc::new(RandomPermutation),
        }
    }

    pub fn with_permutation<P>(mut self, permute: P) -> Self
    where
        P: Permute + 'static,
    {
        self.permute = Arc::new(permute);
        self
    }

    /// Socket addresses (port 0, filled in by the connector) for `host`, in
    /// the order they should be tried.
    pub async fn resolve_addrs(&self, host: &str) -> Result<Vec<SocketAddr>, ResolutionError> {
        resolve_socket_addrs(&self.cache, self.permute.as_ref(), host).await
    }
}

async fn resolve_socket_addrs(
    cache: &DnsCache,
    permute: &dyn Permute,
    host: &str,
) -> Result<Vec<SocketAddr>, ResolutionError> {
    let addrs = cache.lookup(host).await?;
    let order = permute.permutation(addrs.len());

    // Custom resolvers may hand back names rather than IP literals; reqwest
    // can only use the latter.
    let resolved: Vec<SocketAddr> = order
        .into_iter()
        .filter_map(|i| addrs.get(i))
        .filter_map(|addr| addr.parse::<IpAddr>().ok())
        .map(|ip| SocketAddr::new(ip, 0))
        .collect();

    if resolved.is_empty() {
        return Err(ResolutionError::no_addresses(host));
    }
    debug!("Resolved {} to {} addresses", host, resolved.len());
    Ok(resolved)
}

impl Resolve for CachedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let cache = self.cache.clone();
        let permute = self.permute.clone();
        Box::pin(async move {
            let addrs = resolve_socket_addrs(&cache, permute.as_ref(), name.as_str()).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// Client builder preconfigured to resolve through `cache`
pub fn cached_client_builder(cache: Arc<DnsCache>) -> ClientBuilder {
    ClientBuilder::new()
        .dns_resolver(Arc::new(CachedResolver::new(cache)))
        // Connection pooling
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30))
        // Bounds the whole connect phase; hyper divides it between the
        // resolved addresses
        .connect_timeout(Duration::from_millis(5000))
        .timeout(Duration::from_millis(30000))
        // TCP
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(60))
        .gzip(true)
        .user_agent(concat!("dialcache/", env!("CARGO_PKG_VERSION")))
}

/// Create an HTTP client that resolves hostnames through `cache`
pub fn create_cached_client(cache: Arc<DnsCache>) -> Result<Client, reqwest::Error> {
    cached_client_builder(cache).build()
}
