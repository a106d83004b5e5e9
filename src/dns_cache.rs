//! DNS caching to keep hostname lookups off the dial path
//!
//! [`DnsCache`] maps hostnames to the addresses they resolved to. Lookups are
//! answered from memory whenever the host is already known; a background task
//! re-resolves every known host on a fixed interval so the data does not go
//! stale. When a refresh fails the previous addresses are kept: a resolver
//! hiccup should not break dialing of an address set that was working.

use crate::config::DnsCacheConfig;
use crate::errors::{ConfigError, ResolutionError};
use crate::resolver::{LookupHost, SystemResolver};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on hosts re-resolved at the same time during one refresh pass
const REFRESH_CONCURRENCY: usize = 8;

/// Addresses for one hostname, in resolution order. Never empty.
pub type Addresses = Arc<[String]>;

/// State shared between the cache handle and its refresh task
struct Shared {
    resolver: Arc<dyn LookupHost>,
    entries: RwLock<HashMap<String, Addresses>>,
    lookup_timeout: Duration,
}

impl Shared {
    /// Run the resolver for `host`, bounded by the lookup timeout. The map
    /// lock is not held while this runs.
    async fn resolve(&self, host: &str) -> Result<Addresses, ResolutionError> {
        let lookup = self.resolver.lookup_host(host);
        let addrs = match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => return Err(ResolutionError::lookup(host, e)),
            Err(_) => return Err(ResolutionError::timeout(host, self.lookup_timeout)),
        };

        if addrs.is_empty() {
            return Err(ResolutionError::no_addresses(host));
        }
        Ok(addrs.into())
    }

    async fn cached(&self, host: &str) -> Option<Addresses> {
        let entries = self.entries.read().await;
        entries.get(host).filter(|addrs| !addrs.is_empty()).cloned()
    }

    /// Re-resolve a single known host. Returns whether the entry was replaced.
    async fn refresh_host(&self, host: String) -> bool {
        match self.resolve(&host).await {
            Ok(addrs) => {
                let mut entries = self.entries.write().await;
                // Cleared while we were resolving: don't bring it back
                match entries.get_mut(&host) {
                    Some(slot) => {
                        *slot = addrs;
                        true
                    }
                    None => false,
                }
            }
            Err(e) => {
                warn!("DNS refresh failed, keeping previous addresses: {}", e);
                false
            }
        }
    }

    async fn refresh_all(&self) -> usize {
        let hosts: Vec<String> = {
            let entries = self.entries.read().await;
            entries.keys().cloned().collect()
        };

        let refreshed = stream::iter(hosts)
            .map(|host| self.refresh_host(host))
            .buffer_unordered(REFRESH_CONCURRENCY)
            .fold(0, |n, replaced| async move { n + usize::from(replaced) })
            .await;

        debug!("DNS refresh pass replaced {} entries", refreshed);
        refreshed
    }
}

/// DNS cache for resolving hostnames, refreshed in the background
pub struct DnsCache {
    shared: Arc<Shared>,
    config: DnsCacheConfig,
    shutdown: CancellationToken,
}

impl DnsCache {
    /// Create a cache backed by the platform resolver.
    ///
    /// Must be called from within a tokio runtime; the refresh task is
    /// spawned onto it immediately.
    pub fn new(refresh_interval: Duration, lookup_timeout: Duration) -> Result<Self, ConfigError> {
        Self::from_config(DnsCacheConfig::new(refresh_interval, lookup_timeout))
    }

    pub fn from_config(config: DnsCacheConfig) -> Result<Self, ConfigError> {
        Self::with_resolver(config, SystemResolver)
    }

    /// Create a cache that resolves hostnames through `resolver`
    pub fn with_resolver<R>(config: DnsCacheConfig, resolver: R) -> Result<Self, ConfigError>
    where
        R: LookupHost + 'static,
    {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let shared = Arc::new(Shared {
            resolver: Arc::new(resolver),
            entries: RwLock::new(HashMap::new()),
            lookup_timeout: config.lookup_timeout,
        });
        let shutdown = CancellationToken::new();

        runtime.spawn(refresh_loop(
            Arc::downgrade(&shared),
            config.refresh_interval,
            shutdown.clone(),
        ));

        Ok(Self {
            shared,
            config,
            shutdown,
        })
    }

    /// Addresses for `host`, from the cache when known, otherwise resolved
    /// now and remembered for later calls.
    ///
    /// A cached entry is always served, even if the last background refresh
    /// for it failed.
    pub async fn lookup(&self, host: &str) -> Result<Addresses, ResolutionError> {
        if let Some(addrs) = self.shared.cached(host).await {
            debug!("DNS cache hit for {}", host);
            return Ok(addrs);
        }

        debug!("DNS cache miss for {}, resolving", host);
        let addrs = self.shared.resolve(host).await?;

        let mut entries = self.shared.entries.write().await;
        entries.insert(host.to_string(), addrs.clone());

        Ok(addrs)
    }

    /// Pre-warm the cache by resolving a hostname
    pub async fn prewarm(&self, hostname: &str) -> Result<(), ResolutionError> {
        self.lookup(hostname).await?;
        Ok(())
    }

    /// Run one refresh pass immediately, returning how many entries were
    /// replaced with fresh addresses.
    pub async fn refresh_now(&self) -> usize {
        self.shared.refresh_all().await
    }

    /// Clear the cache
    pub async fn clear(&self) {
        let mut entries = self.shared.entries.write().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.shared.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.entries.read().await.is_empty()
    }

    /// Hostnames currently held, in no particular order
    pub async fn hosts(&self) -> Vec<String> {
        self.shared.entries.read().await.keys().cloned().collect()
    }

    pub fn config(&self) -> &DnsCacheConfig {
        &self.config
    }

    /// Stop the background refresh task. Calling this more than once is
    /// harmless. Lookups keep working afterwards; entries just stop being
    /// refreshed.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Stopping DNS cache refresh");
        }
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for DnsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsCache")
            .field("config", &self.config)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Re-resolve every cached host each `interval` until stopped. Holds only a
/// weak reference so a dropped cache ends the loop on its next tick.
async fn refresh_loop(shared: Weak<Shared>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("DNS cache refresh started (every {:?})", interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(state) = shared.upgrade() else { break };
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = state.refresh_all() => {}
                }
            }
        }
    }

    debug!("DNS cache refresh loop exited");
}
