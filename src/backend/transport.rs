//! Wire access to the descriptor service and the metrics store.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics;
use crate::models::BackendDescriptor;
use crate::{MeasureError, Result};

/// Looks up the metric settings the platform declares for an app.
#[async_trait]
pub trait DescriptorLookup: Send + Sync {
    /// `Ok(None)` when the platform has nothing to say (any non-200 reply).
    async fn metric_envs(&self, app: &str, credential: &str) -> Result<Option<HashMap<String, String>>>;
}

/// Runs a search against the metrics store.
#[async_trait]
pub trait StoreTransport: Send + Sync {
    async fn search(&self, backend: &BackendDescriptor, doc_type: &str, query: &Value) -> Result<Value>;
}

/// reqwest-backed implementation of both collaborators.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    descriptor_host: String,
}

impl HttpTransport {
    pub fn new(descriptor_host: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeasureError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        let descriptor_host = descriptor_host.into().trim_end_matches('/').to_string();
        Ok(Self { http, descriptor_host })
    }
}

/// Keeps the string-valued entries of a descriptor body.
fn string_entries(body: HashMap<String, Value>) -> HashMap<String, String> {
    body.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl DescriptorLookup for HttpTransport {
    async fn metric_envs(&self, app: &str, credential: &str) -> Result<Option<HashMap<String, String>>> {
        let url = format!("{}/apps/{}/metric/envs", self.descriptor_host, app);
        metrics::DESCRIPTOR_LOOKUPS.inc();

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, credential)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            debug!(app, status = %response.status(), "no metric descriptor");
            return Ok(None);
        }

        let body = response.bytes().await?;
        match serde_json::from_slice::<HashMap<String, Value>>(&body) {
            Ok(body) => Ok(Some(string_entries(body))),
            Err(e) => {
                warn!(app, error = %e, "unreadable metric descriptor, ignoring");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl StoreTransport for HttpTransport {
    async fn search(&self, backend: &BackendDescriptor, doc_type: &str, query: &Value) -> Result<Value> {
        let url = backend.search_url(doc_type);
        debug!(%url, "querying metrics store");

        let response = self.http.post(&url).json(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MeasureError::BackendUnavailable(format!(
                "store replied {} for {}",
                status, url
            )));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| MeasureError::MalformedResponse(format!("store body is not JSON: {}", e)))
    }
}
