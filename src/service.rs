//! Runs metric requests end to end: backend, query, store, reduction.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::backend::{BackendSelector, DescriptorLookup, HttpTransport, StoreTransport};
use crate::config::Settings;
use crate::kind::{KindOptions, MetricKind};
use crate::metrics::{self, QueryTimer};
use crate::models::{BackendDescriptor, MetricRequest, SeriesResult};
use crate::query::{build_filter, build_query};
use crate::reduce::{reduce, CompositeKeyFormat};
use crate::{MeasureError, Result};

#[derive(Clone)]
pub struct MetricsService {
    selector: BackendSelector,
    store: Arc<dyn StoreTransport>,
    options: KindOptions,
    deadline: Duration,
    max_concurrent: usize,
}

impl MetricsService {
    pub fn new(
        settings: &Settings,
        lookup: Arc<dyn DescriptorLookup>,
        store: Arc<dyn StoreTransport>,
    ) -> Self {
        Self {
            selector: BackendSelector::new(lookup, settings.product.clone()),
            store,
            options: KindOptions {
                network: settings.network_rate,
                composite: CompositeKeyFormat::new(settings.composite_delimiter),
            },
            deadline: settings.store_timeout,
            max_concurrent: settings.max_concurrent_queries.max(1),
        }
    }

    /// Service talking HTTP to both the descriptor host and the store.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&settings.descriptor_host, settings.store_timeout)?);
        Ok(Self::new(settings, transport.clone(), transport))
    }

    async fn within_deadline<T>(&self, what: &str, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        timeout(self.deadline, fut).await.map_err(|_| {
            MeasureError::BackendUnavailable(format!("{} exceeded {:?}", what, self.deadline))
        })?
    }

    async fn resolve(&self, request: &MetricRequest, credential: &str) -> Result<BackendDescriptor> {
        let resolved = self
            .within_deadline(
                "descriptor lookup",
                self.selector.resolve(&request.app, credential, request.range.as_ref()),
            )
            .await;
        if let Err(MeasureError::MetricsNotConfigured { .. }) = &resolved {
            metrics::record_not_configured();
        }
        resolved
    }

    /// Fetches one metric kind for one app.
    #[instrument(skip(self, request, credential), fields(app = %request.app.name, kind = %request.kind))]
    pub async fn fetch(&self, request: &MetricRequest, credential: &str) -> Result<SeriesResult> {
        let backend = self.resolve(request, credential).await?;
        self.query_kind(&backend, request).await
    }

    /// Fetches several kinds for the same app and window.
    ///
    /// The backend is resolved once; failing that fails the batch. Each
    /// kind then runs independently, at most `max_concurrent` at a time,
    /// and results come back in the order of `kinds`.
    #[instrument(skip(self, request, credential, kinds), fields(app = %request.app.name, kinds = kinds.len()))]
    pub async fn fetch_many(
        &self,
        request: &MetricRequest,
        kinds: &[MetricKind],
        credential: &str,
    ) -> Result<Vec<(MetricKind, Result<SeriesResult>)>> {
        let backend = self.resolve(request, credential).await?;

        let results = stream::iter(kinds.iter().copied())
            .map(|kind| {
                let request = request.for_kind(kind);
                let backend = &backend;
                async move { (kind, self.query_kind(backend, &request).await) }
            })
            .buffered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        info!(total = results.len(), failed, "batch finished");
        Ok(results)
    }

    async fn query_kind(&self, backend: &BackendDescriptor, request: &MetricRequest) -> Result<SeriesResult> {
        let kind = request.kind;
        let _timer = QueryTimer::new(kind);

        let filter = build_filter(&request.app.name, request.process.as_deref(), request.range.as_ref());
        let query = build_query(&filter, request.interval.as_ref(), kind.aggregation(&self.options));

        let result = self
            .within_deadline("store query", self.store.search(backend, kind.doc_type(), &query))
            .await
            .and_then(|raw| reduce(raw, kind.extractor(&self.options), &self.options));

        if let Err(e) = &result {
            warn!(%kind, error = %e, "metric query failed");
            metrics::record_failure(kind);
        }
        result
    }
}
