use async_trait::async_trait;
use measure_metrics::backend::{DescriptorLookup, StoreTransport, DESCRIPTOR_HOST_KEY};
use measure_metrics::config::Settings;
use measure_metrics::models::BackendDescriptor;
use measure_metrics::query::DateRange;
use measure_metrics::{AppInfo, MeasureError, MetricKind, MetricRequest, MetricsService, Result};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Platform {
    store_host: Option<&'static str>,
    credentials: Mutex<Vec<String>>,
}

#[async_trait]
impl DescriptorLookup for Platform {
    async fn metric_envs(&self, _app: &str, credential: &str) -> Result<Option<HashMap<String, String>>> {
        self.credentials.lock().unwrap().push(credential.to_string());
        Ok(self
            .store_host
            .map(|host| HashMap::from([(DESCRIPTOR_HOST_KEY.to_string(), host.to_string())])))
    }
}

struct Store {
    reply: Value,
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl StoreTransport for Store {
    async fn search(&self, backend: &BackendDescriptor, doc_type: &str, _query: &Value) -> Result<Value> {
        self.urls.lock().unwrap().push(backend.search_url(doc_type));
        Ok(self.reply.clone())
    }
}

fn service(store_host: Option<&'static str>, reply: Value) -> (MetricsService, Arc<Platform>, Arc<Store>) {
    let platform = Arc::new(Platform { store_host, credentials: Mutex::new(Vec::new()) });
    let store = Arc::new(Store { reply, urls: Mutex::new(Vec::new()) });
    let service = MetricsService::new(&Settings::default(), platform.clone(), store.clone());
    (service, platform, store)
}

#[test_log::test(tokio::test)]
async fn cpu_max_end_to_end() {
    let reply = json!({
        "took": 4,
        "aggregations": {"date": {"buckets": [
            {"key": 1000, "doc_count": 3, "stats": {"count": 3, "min": 1, "max": 5, "avg": 3}},
            {"key": 2000, "doc_count": 3, "stats": {"count": 3, "min": 2, "max": 6, "avg": 4}},
            {"key": 3000, "doc_count": 3, "stats": {"count": 3, "min": 0, "max": 2, "avg": 1}}
        ]}}
    });
    let (service, platform, store) = service(Some("http://es:9200"), reply);

    let mut request = MetricRequest::new(AppInfo::new("foo"), MetricKind::CpuMax);
    request.range = Some(DateRange::parse("1h").unwrap());
    let result = service.fetch(&request, "bearer secret").await.unwrap();

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "data": {
                "min": [[1000, 1], [2000, 2], [3000, 0]],
                "max": [[1000, 5], [2000, 6], [3000, 2]],
                "avg": [[1000, 3], [2000, 4], [3000, 1]]
            },
            "min": 0,
            "max": 7
        })
    );

    assert_eq!(*platform.credentials.lock().unwrap(), vec!["bearer secret".to_string()]);
    let urls = store.urls.lock().unwrap();
    let today = chrono::Utc::now().format("%Y.%m.%d").to_string();
    assert_eq!(urls[0], format!("http://es:9200/.measure-tsuru-{}/cpu_max/_search", today));
}

#[test_log::test(tokio::test)]
async fn every_kind_reduces_empty_histogram_to_defaults() {
    let (service, _, _) = service(Some("http://es:9200"), json!({"aggregations": {"date": {"buckets": []}}}));
    let request = MetricRequest::new(AppInfo::new("foo"), MetricKind::CpuMax);

    let results = service.fetch_many(&request, &MetricKind::ALL, "t").await.unwrap();
    assert_eq!(results.len(), MetricKind::ALL.len());
    for (kind, result) in results {
        let result = result.unwrap_or_else(|e| panic!("{kind} failed: {e}"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"data": {}, "min": 0, "max": 1}),
            "{kind}"
        );
    }
}

#[test]
fn missing_backend_is_reported_not_retried() {
    let (service, platform, store) = service(None, json!({}));
    let request = MetricRequest::new(AppInfo::new("foo"), MetricKind::Netrx);

    let err = tokio_test::block_on(service.fetch(&request, "t")).unwrap_err();
    assert!(matches!(err, MeasureError::MetricsNotConfigured { .. }));
    assert!(!err.is_transient());
    assert_eq!(platform.credentials.lock().unwrap().len(), 1);
    assert!(store.urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn long_ranges_use_yearly_index() {
    let (service, _, store) = service(None, json!({}));
    let app = AppInfo::new("foo").with_env("ELASTICSEARCH_HOST", "http://embedded:9200");
    let mut request = MetricRequest::new(app, MetricKind::Connections);
    request.range = Some(DateRange::parse("7d").unwrap());

    let result = service.fetch(&request, "t").await.unwrap();
    assert!(result.data.is_empty());

    let year = chrono::Utc::now().format("%Y").to_string();
    assert_eq!(
        store.urls.lock().unwrap()[0],
        format!("http://embedded:9200/.measure-tsuru-{}.*/connection/_search", year)
    );
}
