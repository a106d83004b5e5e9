//! Failover dialing on top of the DNS cache
//!
//! [`FailoverDialer`] wraps a low-level [`Connector`]. For a `host:port`
//! target it fetches the host's addresses from the [`DnsCache`], puts them in
//! random order and tries them one after another until a connection
//! succeeds. If every address fails, the error from the first attempt is
//! returned as-is.

use crate::dns_cache::DnsCache;
use crate::errors::{DialError, Result};
use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A `host:port` dial target. The port is always explicit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialTarget {
    pub host: String,
    pub port: u16,
}

impl DialTarget {
    /// Split `addr` into host and port. IPv6 literals must be bracketed
    /// (`[::1]:443`).
    pub fn parse(addr: &str) -> Result<Self> {
        let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| DialError::address_format(addr, "missing ']' in address"))?;
            let port = rest[end + 1..]
                .strip_prefix(':')
                .ok_or_else(|| DialError::address_format(addr, "missing port in address"))?;
            (&rest[..end], port)
        } else {
            let idx = addr
                .rfind(':')
                .ok_or_else(|| DialError::address_format(addr, "missing port in address"))?;
            let host = &addr[..idx];
            if host.contains(':') {
                return Err(DialError::address_format(addr, "too many colons in address"));
            }
            (host, &addr[idx + 1..])
        };

        if port.is_empty() {
            return Err(DialError::address_format(addr, "missing port in address"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| DialError::address_format(addr, "invalid port"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for DialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_host_port(&self.host, self.port))
    }
}

/// Join a host and port, bracketing IPv6 literals
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// The low-level dial primitive the failover dialer drives.
///
/// Implemented for closures `Fn(network, addr) -> impl Future<Output = io::Result<C>>`.
pub trait Connector: Send + Sync {
    type Connection: Send;

    fn connect(&self, network: String, addr: String) -> BoxFuture<'static, io::Result<Self::Connection>>;
}

impl<F, Fut, C> Connector for F
where
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = io::Result<C>> + Send + 'static,
    C: Send,
{
    type Connection = C;

    fn connect(&self, network: String, addr: String) -> BoxFuture<'static, io::Result<C>> {
        Box::pin(self(network, addr))
    }
}

/// Plain TCP connector; supports the `tcp`, `tcp4` and `tcp6` networks.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    nodelay: bool,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self { nodelay: true }
    }
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Connector for TcpConnector {
    type Connection = TcpStream;

    fn connect(&self, network: String, addr: String) -> BoxFuture<'static, io::Result<TcpStream>> {
        let nodelay = self.nodelay;
        Box::pin(async move {
            let family_ok = |sa: &SocketAddr| match network.as_str() {
                "tcp4" => sa.is_ipv4(),
                "tcp6" => sa.is_ipv6(),
                _ => true,
            };
            if !matches!(network.as_str(), "tcp" | "tcp4" | "tcp6") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported network {:?}", network),
                ));
            }
            if let Ok(sa) = addr.parse::<SocketAddr>() {
                if !family_ok(&sa) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("address {} does not match network {}", addr, network),
                    ));
                }
            }

            let stream = TcpStream::connect(&addr).await?;
            stream.set_nodelay(nodelay)?;
            Ok::<_, io::Error>(stream)
        })
    }
}

/// Chooses the order in which candidate addresses are tried.
///
/// `permutation(n)` returns indices into a list of `n` addresses; indices
/// out of range are skipped. Implemented for `Fn(usize) -> Vec<usize>`, so a
/// fixed order can be injected in tests.
pub trait Permute: Send + Sync {
    fn permutation(&self, n: usize) -> Vec<usize>;
}

impl<F> Permute for F
where
    F: Fn(usize) -> Vec<usize> + Send + Sync,
{
    fn permutation(&self, n: usize) -> Vec<usize> {
        self(n)
    }
}

/// Uniform random permutation (Fisher-Yates over the thread-local RNG)
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPermutation;

impl Permute for RandomPermutation {
    fn permutation(&self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    }
}

/// Dial wrapper that resolves through a [`DnsCache`] and fails over across
/// the resolved addresses.
pub struct FailoverDialer<C> {
    cache: Arc<DnsCache>,
    connector: C,
    permute: Arc<dyn Permute>,
}

impl<C: Clone> Clone for FailoverDialer<C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            connector: self.connector.clone(),
            permute: self.permute.clone(),
        }
    }
}

impl<C: Connector> FailoverDialer<C> {
    pub fn new(cache: Arc<DnsCache>, connector: C) -> Self {
        Self {
            cache,
            connector,
            permute: Arc::new(RandomPermutation),
        }
    }

    /// Replace the random address ordering
    pub fn with_permutation<P>(mut self, permute: P) -> Self
    where
        P: Permute + 'static,
    {
        self.permute = Arc::new(permute);
        self
    }

    pub fn cache(&self) -> &Arc<DnsCache> {
        &self.cache
    }

    /// Connect to `addr` (`host:port`) over `network`.
    ///
    /// Addresses are tried sequentially in permuted order; the first
    /// successful connection is returned. If all attempts fail, the error of
    /// the first attempt is returned. Cancelling `ctx` aborts the dial,
    /// including an attempt that is in flight.
    pub async fn dial(&self, ctx: &CancellationToken, network: &str, addr: &str) -> Result<C::Connection> {
        let target = DialTarget::parse(addr)?;
        if ctx.is_cancelled() {
            return Err(DialError::cancelled(addr));
        }

        let addrs = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(DialError::cancelled(addr)),
            res = self.cache.lookup(&target.host) => res?,
        };

        let order = self.permute.permutation(addrs.len());
        let mut first_err: Option<io::Error> = None;

        for ip in order.into_iter().filter_map(|i| addrs.get(i)) {
            if ctx.is_cancelled() {
                return Err(DialError::cancelled(addr));
            }

            let candidate = join_host_port(ip, target.port);
            let attempt = self.connector.connect(network.to_string(), candidate.clone());
            let result = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(DialError::cancelled(addr)),
                res = attempt => res,
            };

            match result {
                Ok(conn) => {
                    debug!("Connected to {} via {}", addr, candidate);
                    return Ok(conn);
                }
                Err(e) => {
                    debug!("Dial {} via {} failed: {}", addr, candidate, e);
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(DialError::Connect(e)),
            None => Err(DialError::NoAttempts {
                addr: addr.to_string(),
            }),
        }
    }
}

impl FailoverDialer<TcpConnector> {
    /// Open a TCP connection to `addr` with no external cancellation
    pub async fn dial_tcp(&self, addr: &str) -> Result<TcpStream> {
        self.dial(&CancellationToken::new(), "tcp", addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_host_port() {
        let target = DialTarget::parse("play.min.io:443").unwrap();
        assert_eq!(target.host, "play.min.io");
        assert_eq!(target.port, 443);
        assert_eq!(target.to_string(), "play.min.io:443");
    }

    #[test]
    fn test_parse_ipv6() {
        let target = DialTarget::parse("[::1]:9000").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.port, 9000);
        assert_eq!(target.to_string(), "[::1]:9000");
    }

    #[test]
    fn test_parse_rejects_missing_port() {
        for addr in ["play.min.io", "play.min.io:", "[::1]", "[::1]:", "::1", ""] {
            let err = DialTarget::parse(addr).unwrap_err();
            assert!(err.is_address_format(), "{:?} should be rejected", addr);
        }
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(DialTarget::parse("min.io:https").unwrap_err().is_address_format());
        assert!(DialTarget::parse("min.io:70000").unwrap_err().is_address_format());
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("127.0.0.1", 443), "127.0.0.1:443");
        assert_eq!(join_host_port("fe80::1", 443), "[fe80::1]:443");
    }

    #[test]
    fn test_random_permutation_empty() {
        assert!(RandomPermutation.permutation(0).is_empty());
    }

    #[tokio::test]
    async fn test_tcp_connector_rejects_unknown_network() {
        let err = TcpConnector::new()
            .connect("udp".to_string(), "127.0.0.1:1".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = TcpConnector::new()
            .connect("tcp6".to_string(), "127.0.0.1:1".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    proptest! {
        #[test]
        fn prop_random_permutation_is_permutation(n in 0usize..64) {
            let mut order = RandomPermutation.permutation(n);
            order.sort_unstable();
            prop_assert_eq!(order, (0..n).collect::<Vec<_>>());
        }

        #[test]
        fn prop_target_roundtrips_through_display(
            host in "[a-z][a-z0-9-]{0,20}(\\.[a-z]{2,6}){0,2}",
            port in any::<u16>(),
        ) {
            let addr = join_host_port(&host, port);
            let target = DialTarget::parse(&addr).unwrap();
            prop_assert_eq!(&target.host, &host);
            prop_assert_eq!(target.port, port);
            prop_assert_eq!(target.to_string(), addr);
        }
    }
}
