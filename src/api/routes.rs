use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::Settings,
    kind::MetricKind,
    metrics,
    models::{AppInfo, MetricRequest, SeriesResult},
    query::{DateRange, Interval},
    service::MetricsService,
    MeasureError, Result,
};

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<MetricsService>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub app: AppInfo,
    pub process: Option<String>,
    pub range: Option<DateRange>,
    pub interval: Option<Interval>,
}

impl SeriesRequest {
    fn into_metric_request(self, kind: MetricKind) -> MetricRequest {
        MetricRequest {
            app: self.app,
            process: self.process,
            range: self.range,
            interval: self.interval,
            kind,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(flatten)]
    pub series: SeriesRequest,
    pub kinds: Vec<MetricKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KindOutcome {
    Result(SeriesResult),
    Error(String),
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/metrics", post(get_batch))
        .route("/metrics/:kind", post(get_series))
        .route("/internal/metrics", get(prometheus_metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

fn credential(headers: &HeaderMap) -> &str {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn get_series(
    State(state): State<ApiState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SeriesRequest>,
) -> Result<Json<SeriesResult>> {
    let kind: MetricKind = kind.parse()?;
    info!("Fetching {} for app {}", kind, body.app.name);

    let request = body.into_metric_request(kind);
    let result = state.service.fetch(&request, credential(&headers)).await?;
    Ok(Json(result))
}

/// Requested kinds in first-seen order, each once.
fn unique_kinds(kinds: &[MetricKind]) -> Vec<MetricKind> {
    let mut seen = BTreeSet::new();
    kinds.iter().copied().filter(|kind| seen.insert(*kind)).collect()
}

async fn get_batch(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<BatchRequest>,
) -> Result<Json<BTreeMap<MetricKind, KindOutcome>>> {
    let kinds = unique_kinds(&body.kinds);
    let Some(&first) = kinds.first() else {
        return Err(MeasureError::InvalidRequest("no metric kinds requested".into()));
    };
    info!("Fetching {} metric kinds for app {}", kinds.len(), body.series.app.name);

    let request = body.series.into_metric_request(first);
    let results = state
        .service
        .fetch_many(&request, &kinds, credential(&headers))
        .await?;

    let outcomes = results
        .into_iter()
        .map(|(kind, result)| {
            let outcome = match result {
                Ok(series) => KindOutcome::Result(series),
                Err(e) => KindOutcome::Error(e.to_string()),
            };
            (kind, outcome)
        })
        .collect();
    Ok(Json(outcomes))
}

async fn prometheus_metrics() -> String {
    metrics::render()
}

async fn healthz() -> &'static str {
    "ok"
}

pub async fn serve(settings: &Settings) -> Result<()> {
    let service = Arc::new(MetricsService::from_settings(settings)?);
    let app = router(ApiState { service }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr = format!("0.0.0.0:{}", settings.port);
    info!("Starting metrics API on {}", addr);

    let listener = TcpListener::bind(&addr).await.map_err(|e|
        MeasureError::Internal(format!("Failed to bind to address: {}", e)))?;

    axum::serve(listener, app).await.map_err(|e|
        MeasureError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
