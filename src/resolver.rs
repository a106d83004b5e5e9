//! Hostname resolution strategies
//!
//! The cache never talks to DNS itself. It delegates to a [`LookupHost`]
//! implementation supplied at construction time, which makes it easy to swap
//! the platform resolver for a custom one (split-horizon setups, tests).

use futures::future::BoxFuture;
use hickory_resolver::config::*;
use hickory_resolver::TokioAsyncResolver;
use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use tracing::debug;

/// Maps a hostname to the list of addresses it currently resolves to.
///
/// Implemented for any `Fn(String) -> impl Future<Output = io::Result<Vec<String>>>`,
/// so closures can be passed straight to [`crate::DnsCache::with_resolver`].
pub trait LookupHost: Send + Sync {
    fn lookup_host<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<String>>>;
}

impl<F, Fut> LookupHost for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<Vec<String>>> + Send + 'static,
{
    fn lookup_host<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<String>>> {
        Box::pin(self(host.to_owned()))
    }
}

/// Platform resolver (`getaddrinfo`), the default for [`crate::DnsCache::new`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl LookupHost for SystemResolver {
    fn lookup_host<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<String>>> {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host, 0)).await?;
            Ok::<_, io::Error>(dedup_ips(addrs.map(|sa| sa.ip())))
        })
    }
}

/// Resolver that queries nameservers directly through hickory, bypassing
/// the platform's own caching.
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Use the nameservers from the system configuration (`resolv.conf`)
    pub fn from_system_conf() -> io::Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().map_err(io::Error::other)?;
        Ok(Self { resolver })
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::with_config(ResolverConfig::default(), ResolverOpts::default())
    }
}

impl LookupHost for HickoryResolver {
    fn lookup_host<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<String>>> {
        Box::pin(async move {
            let lookup = self.resolver.lookup_ip(host).await.map_err(io::Error::other)?;
            debug!("hickory lookup for {} valid until {:?}", host, lookup.valid_until());
            Ok::<_, io::Error>(dedup_ips(lookup.iter()))
        })
    }
}

/// `getaddrinfo` reports one entry per socket type, so the same IP usually
/// shows up more than once.
fn dedup_ips(ips: impl Iterator<Item = IpAddr>) -> Vec<String> {
    let mut seen: HashSet<IpAddr> = HashSet::new();
    ips.filter(|ip| seen.insert(*ip))
        .map(|ip| ip.to_string())
        .collect()
}
