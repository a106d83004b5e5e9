//! Error types for the DNS cache and failover dialer

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result alias used by the dialer
pub type Result<T> = std::result::Result<T, DialError>;

/// Failure to turn a hostname into a usable address list
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("lookup {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("lookup {host}: timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },

    #[error("lookup {host}: no addresses found")]
    NoAddresses { host: String },
}

impl ResolutionError {
    pub fn lookup(host: impl Into<String>, source: io::Error) -> Self {
        Self::Lookup {
            host: host.into(),
            source,
        }
    }

    pub fn timeout(host: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            host: host.into(),
            timeout,
        }
    }

    pub fn no_addresses(host: impl Into<String>) -> Self {
        Self::NoAddresses { host: host.into() }
    }

    /// Hostname the failed resolution was for
    pub fn host(&self) -> &str {
        match self {
            Self::Lookup { host, .. } | Self::Timeout { host, .. } | Self::NoAddresses { host } => {
                host
            }
        }
    }
}

/// Errors returned by [`crate::FailoverDialer::dial`]
#[derive(Error, Debug)]
pub enum DialError {
    /// The dial target is not a `host:port` pair
    #[error("address {addr}: {reason}")]
    AddressFormat { addr: String, reason: &'static str },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// First connection failure of the dial, carried unchanged
    #[error(transparent)]
    Connect(io::Error),

    #[error("dial {addr}: operation was cancelled")]
    Cancelled { addr: String },

    #[error("dial {addr}: no candidate address was attempted")]
    NoAttempts { addr: String },
}

impl DialError {
    pub fn address_format(addr: impl Into<String>, reason: &'static str) -> Self {
        Self::AddressFormat {
            addr: addr.into(),
            reason,
        }
    }

    pub fn cancelled(addr: impl Into<String>) -> Self {
        Self::Cancelled { addr: addr.into() }
    }

    pub fn is_address_format(&self) -> bool {
        matches!(self, Self::AddressFormat { .. })
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Convert into an `io::Error`, handing back the connector's own error
    /// untouched when the dial failed while connecting.
    pub fn into_io_error(self) -> io::Error {
        let kind = match &self {
            Self::Connect(err) => err.kind(),
            Self::AddressFormat { .. } => io::ErrorKind::InvalidInput,
            Self::Resolution(ResolutionError::Timeout { .. }) => io::ErrorKind::TimedOut,
            Self::Resolution(_) => io::ErrorKind::NotFound,
            Self::Cancelled { .. } => io::ErrorKind::Interrupted,
            Self::NoAttempts { .. } => io::ErrorKind::Other,
        };

        match self {
            Self::Connect(err) => err,
            other => io::Error::new(kind, other),
        }
    }
}

impl From<DialError> for io::Error {
    fn from(err: DialError) -> Self {
        err.into_io_error()
    }
}

/// Invalid cache construction parameters
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("refresh interval must be greater than zero")]
    ZeroRefreshInterval,

    #[error("lookup timeout must be greater than zero")]
    ZeroLookupTimeout,

    #[error("dns cache must be created inside a tokio runtime")]
    NoRuntime,

    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}
