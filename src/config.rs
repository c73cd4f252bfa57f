//! Service settings, read from the environment.

use std::env;
use std::time::Duration;

use crate::backend::DEFAULT_PRODUCT;
use crate::kind::NetworkRateMode;
use crate::logging::LogFormat;
use crate::reduce::composite::DEFAULT_DELIMITER;
use crate::{MeasureError, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the platform API serving metric descriptors.
    pub descriptor_host: String,
    pub port: u16,
    /// Product segment of the `.measure-<product>-*` indices.
    pub product: String,
    /// Deadline for one metric kind, lookup included.
    pub store_timeout: Duration,
    /// Metric kinds queried at once for a batch request.
    pub max_concurrent_queries: usize,
    pub network_rate: NetworkRateMode,
    pub composite_delimiter: char,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            descriptor_host: "http://localhost:8080".to_string(),
            port: 8888,
            product: DEFAULT_PRODUCT.to_string(),
            store_timeout: Duration::from_secs(10),
            max_concurrent_queries: 4,
            network_rate: NetworkRateMode::Scripted,
            composite_delimiter: DEFAULT_DELIMITER,
            log_format: LogFormat::Compact,
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| MeasureError::InvalidConfig(format!("{}={:?}: {}", key, raw, e)))
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key/value source; unset keys keep defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(host) = get("DESCRIPTOR_HOST").or_else(|| get("TSURU_HOST")) {
            settings.descriptor_host = host;
        }
        if let Some(port) = get("PORT") {
            settings.port = parse("PORT", &port)?;
        }
        if let Some(product) = get("MEASURE_PRODUCT") {
            settings.product = product;
        }
        if let Some(ms) = get("STORE_TIMEOUT_MS") {
            settings.store_timeout = Duration::from_millis(parse("STORE_TIMEOUT_MS", &ms)?);
        }
        if let Some(n) = get("MAX_CONCURRENT_QUERIES") {
            settings.max_concurrent_queries = parse("MAX_CONCURRENT_QUERIES", &n)?;
        }
        if let Some(mode) = get("NETWORK_RATE_MODE") {
            settings.network_rate = mode.trim().parse()?;
        }
        if let Some(delimiter) = get("COMPOSITE_KEY_DELIMITER") {
            settings.composite_delimiter = parse("COMPOSITE_KEY_DELIMITER", &delimiter)?;
        }
        if let Some(format) = get("LOG_FORMAT") {
            settings.log_format = format.parse()?;
        }

        if settings.max_concurrent_queries == 0 {
            return Err(MeasureError::InvalidConfig("MAX_CONCURRENT_QUERIES must be at least 1".into()));
        }
        Ok(settings)
    }
}
