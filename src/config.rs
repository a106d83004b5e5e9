//! Construction parameters for the DNS cache

use crate::errors::ConfigError;
use crate::{DEFAULT_LOOKUP_TIMEOUT_SECS, DEFAULT_REFRESH_INTERVAL_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REFRESH_INTERVAL_ENV: &str = "DIALCACHE_REFRESH_INTERVAL_SECS";
const LOOKUP_TIMEOUT_ENV: &str = "DIALCACHE_LOOKUP_TIMEOUT_MS";

/// How often cached hostnames are re-resolved, and how long a single
/// resolution may take.
///
/// Serialized as `refresh_interval_secs` and `lookup_timeout_ms`, the same
/// units as the environment overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsCacheConfig {
    #[serde(rename = "refresh_interval_secs", with = "duration_secs")]
    pub refresh_interval: Duration,
    #[serde(rename = "lookup_timeout_ms", with = "duration_ms")]
    pub lookup_timeout: Duration,
}

impl Default for DnsCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
        }
    }
}

impl DnsCacheConfig {
    pub fn new(refresh_interval: Duration, lookup_timeout: Duration) -> Self {
        Self {
            refresh_interval,
            lookup_timeout,
        }
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Load overrides from the environment (and a `.env` file if present),
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(value) = dotenvy::var(REFRESH_INTERVAL_ENV) {
            config.refresh_interval = Duration::from_secs(parse_env(REFRESH_INTERVAL_ENV, value)?);
        }
        if let Ok(value) = dotenvy::var(LOOKUP_TIMEOUT_ENV) {
            config.lookup_timeout = Duration::from_millis(parse_env(LOOKUP_TIMEOUT_ENV, value)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::ZeroLookupTimeout);
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

fn parse_env(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
