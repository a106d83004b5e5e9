//! Common utilities for integration tests

#![allow(dead_code)]

use dialcache::{Connector, DnsCache, DnsCacheConfig, LookupHost};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_REFRESH: Duration = Duration::from_secs(1);
pub const TEST_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// In-memory resolver with a switch to make every lookup fail
#[derive(Clone, Default)]
pub struct StubResolver {
    hosts: Arc<Mutex<HashMap<String, Vec<String>>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl StubResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, host: &str, addrs: &[&str]) -> Self {
        self.set_host(host, addrs);
        self
    }

    pub fn set_host(&self, host: &str, addrs: &[&str]) {
        let addrs = addrs.iter().map(|a| a.to_string()).collect();
        self.hosts.lock().unwrap().insert(host.to_string(), addrs);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LookupHost for StubResolver {
    fn lookup_host<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Vec<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::Other, "resolver unavailable"))
        } else {
            self.hosts
                .lock()
                .unwrap()
                .get(host)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such host {}", host)))
        };
        Box::pin(async move { result })
    }
}

/// Build a cache over `resolver` with short test intervals
pub fn test_cache(resolver: StubResolver) -> Arc<DnsCache> {
    let config = DnsCacheConfig::new(TEST_REFRESH, TEST_LOOKUP_TIMEOUT);
    Arc::new(DnsCache::with_resolver(config, resolver).expect("valid test config"))
}

/// Connector that records every attempt and fails the addresses it was
/// told to fail. Successful "connections" are the dialed address.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    attempts: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<String, String>>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make dials to `addr` fail with an error carrying `message`
    pub fn fail(self, addr: &str, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(addr.to_string(), message.to_string());
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Connector for RecordingConnector {
    type Connection = String;

    fn connect(&self, _network: String, addr: String) -> BoxFuture<'static, io::Result<String>> {
        self.attempts.lock().unwrap().push(addr.clone());
        let failure = self.failures.lock().unwrap().get(&addr).cloned();
        Box::pin(async move {
            match failure {
                Some(message) => Err(io::Error::new(io::ErrorKind::ConnectionRefused, message)),
                None => Ok(addr),
            }
        })
    }
}

/// Permutation that always returns the given indices
pub fn fixed_order(order: &'static [usize]) -> impl Fn(usize) -> Vec<usize> + Send + Sync {
    move |_n| order.to_vec()
}
