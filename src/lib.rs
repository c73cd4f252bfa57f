pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod kind;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod query;
pub mod reduce;
pub mod service;

pub use error::{MeasureError, Result};
pub use kind::MetricKind;
pub use models::{AppInfo, MetricRequest, SeriesResult};
pub use service::MetricsService;
