//! Picks the metrics store and index for a request.

pub mod transport;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::models::{AppInfo, BackendDescriptor};
use crate::query::{DateRange, IndexStrategy};
use crate::{MeasureError, Result};

pub use transport::{DescriptorLookup, HttpTransport, StoreTransport};

/// Descriptor key naming the store host.
pub const DESCRIPTOR_HOST_KEY: &str = "METRICS_ELASTICSEARCH_HOST";

/// App env var consulted when the descriptor has no host.
pub const EMBEDDED_HOST_KEY: &str = "ELASTICSEARCH_HOST";

pub const DEFAULT_PRODUCT: &str = "tsuru";

/// Index pattern for `strategy` on the UTC day of `now`.
pub fn index_name(product: &str, strategy: IndexStrategy, now: DateTime<Utc>) -> String {
    match strategy {
        IndexStrategy::Daily => format!(".measure-{}-{}", product, now.format("%Y.%m.%d")),
        IndexStrategy::YearlyWildcard => format!(".measure-{}-{}.*", product, now.format("%Y")),
    }
}

#[derive(Clone)]
pub struct BackendSelector {
    lookup: Arc<dyn DescriptorLookup>,
    product: String,
}

impl BackendSelector {
    pub fn new(lookup: Arc<dyn DescriptorLookup>, product: impl Into<String>) -> Self {
        Self { lookup, product: product.into() }
    }

    pub async fn resolve(
        &self,
        app: &AppInfo,
        credential: &str,
        range: Option<&DateRange>,
    ) -> Result<BackendDescriptor> {
        self.resolve_at(app, credential, range, Utc::now()).await
    }

    /// Descriptor host first, then the app's embedded env, else the app has
    /// no metrics backend.
    #[instrument(skip(self, app, credential, now), fields(app = %app.name))]
    pub async fn resolve_at(
        &self,
        app: &AppInfo,
        credential: &str,
        range: Option<&DateRange>,
        now: DateTime<Utc>,
    ) -> Result<BackendDescriptor> {
        let declared = self
            .lookup
            .metric_envs(&app.name, credential)
            .await?
            .and_then(|mut envs| envs.remove(DESCRIPTOR_HOST_KEY));

        let url = match declared {
            Some(url) => url,
            None => {
                debug!("descriptor has no store host, trying app envs");
                app.envs
                    .get(EMBEDDED_HOST_KEY)
                    .cloned()
                    .ok_or_else(|| MeasureError::MetricsNotConfigured { app: app.name.clone() })?
            }
        };

        let strategy = range.map_or(IndexStrategy::Daily, DateRange::index_strategy);
        let backend = BackendDescriptor {
            url: url.trim_end_matches('/').to_string(),
            index: index_name(&self.product, strategy, now),
        };
        info!(url = %backend.url, index = %backend.index, "resolved metrics backend");
        Ok(backend)
    }
}
