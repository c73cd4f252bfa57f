//! Subscriber setup for the service binary.

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::MeasureError;

/// Output shape of log lines, chosen with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output for terminals.
    #[default]
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(MeasureError::InvalidConfig(format!("unknown log format {:?}", other))),
        }
    }
}

/// Filter used when `RUST_LOG` is unset: the service and the HTTP trace
/// layer at INFO.
fn default_directives(service: &str) -> String {
    format!("{}={},tower_http={}", service, Level::INFO, Level::INFO)
}

/// Installs the global subscriber. Returns an error when one is already set.
pub fn init_logger(service: &str, format: LogFormat) -> Result<(), MeasureError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(service)));

    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
    });
    let compact_layer = (format == LogFormat::Compact).then(|| {
        fmt::layer()
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(compact_layer)
        .try_init()
        .map_err(|e| MeasureError::Internal(format!("Failed to initialize logger: {}", e)))
}
