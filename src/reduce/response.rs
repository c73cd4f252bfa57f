//! Typed view over the store's search response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::{MeasureError, Result};

/// One slice of the top-level `date` histogram.
#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    /// Bucket start, epoch millis.
    pub key: i64,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(flatten)]
    aggs: Map<String, Value>,
}

impl Bucket {
    pub fn agg<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        sub_aggregation(&self.aggs, name, self.key)
    }
}

/// A group inside a `terms` sub-aggregation.
#[derive(Debug, Clone, Deserialize)]
pub struct TermsBucket {
    key: Value,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(flatten)]
    aggs: Map<String, Value>,
}

impl TermsBucket {
    /// Terms keys come back as strings or numbers depending on the field type.
    pub fn key(&self) -> String {
        match &self.key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn agg<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        sub_aggregation(&self.aggs, name, &self.key)
    }
}

fn sub_aggregation<T: DeserializeOwned>(
    aggs: &Map<String, Value>,
    name: &str,
    owner: impl std::fmt::Display,
) -> Result<T> {
    let raw = aggs.get(name).ok_or_else(|| {
        MeasureError::MalformedResponse(format!("bucket {} has no {:?} aggregation", owner, name))
    })?;
    T::deserialize(raw).map_err(|e| {
        MeasureError::MalformedResponse(format!("aggregation {:?} in bucket {}: {}", name, owner, e))
    })
}

/// Numeric metric as the store renders it: a number, `null`, or a string
/// such as `"NaN"` for buckets without documents.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreNumber {
    Number(f64),
    Text(String),
}

impl StoreNumber {
    fn finite(self) -> Option<f64> {
        let value = match self {
            StoreNumber::Number(v) => v,
            StoreNumber::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

fn store_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(Option::<StoreNumber>::deserialize(deserializer)?.and_then(StoreNumber::finite))
}

fn store_numbers<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<HashMap<String, Option<f64>>, D::Error> {
    let raw = HashMap::<String, Option<StoreNumber>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, v.and_then(StoreNumber::finite)))
        .collect())
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Stats {
    #[serde(default, deserialize_with = "store_number")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "store_number")]
    pub max: Option<f64>,
    #[serde(default, deserialize_with = "store_number")]
    pub avg: Option<f64>,
}

/// `sum`, `max`, `cardinality` and `scripted_metric` results.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SingleValue {
    #[serde(default, deserialize_with = "store_number")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Percentiles {
    #[serde(deserialize_with = "store_numbers")]
    values: HashMap<String, Option<f64>>,
}

impl Percentiles {
    /// Looks up a percentile by its rendered key (`"95.0"`).
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.values.get(&format!("{:.1}", percentile)).copied().flatten()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Terms {
    pub buckets: Vec<TermsBucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopHits {
    hits: HitsEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
struct HitsEnvelope {
    hits: Vec<Hit>,
}

#[derive(Debug, Clone, Deserialize)]
struct Hit {
    #[serde(default)]
    sort: Vec<Value>,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

/// A counter reading at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl TopHits {
    /// First hit as a sample, timestamped by its sort value.
    pub fn sample(&self) -> Result<Option<Sample>> {
        let Some(hit) = self.hits.hits.first() else {
            return Ok(None);
        };
        let timestamp = hit.sort.first().and_then(Value::as_i64).ok_or_else(|| {
            MeasureError::MalformedResponse("top hit without a timestamp sort value".into())
        })?;
        let value = hit.source.get("value").and_then(Value::as_f64).ok_or_else(|| {
            MeasureError::MalformedResponse("top hit without a numeric value".into())
        })?;
        Ok(Some(Sample { timestamp, value }))
    }
}

/// Top-level search response; only the histogram matters.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    aggregations: Option<Map<String, Value>>,
}

impl SearchResponse {
    pub fn from_value(raw: Value) -> Result<Self> {
        serde_json::from_value(raw)
            .map_err(|e| MeasureError::MalformedResponse(format!("search response: {}", e)))
    }

    /// Histogram buckets in store order. No `aggregations` at all means the
    /// index had nothing to aggregate and yields no buckets.
    pub fn buckets(self) -> Result<Vec<Bucket>> {
        let Some(mut aggregations) = self.aggregations else {
            return Ok(Vec::new());
        };
        let date = aggregations
            .remove("date")
            .ok_or_else(|| MeasureError::MalformedResponse("missing date histogram".into()))?;

        #[derive(Deserialize)]
        struct Histogram {
            buckets: Vec<Bucket>,
        }
        let histogram: Histogram = serde_json::from_value(date)
            .map_err(|e| MeasureError::MalformedResponse(format!("date histogram: {}", e)))?;
        Ok(histogram.buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_aggregations_has_no_buckets() {
        let response = SearchResponse::from_value(json!({"took": 3, "hits": {"total": 0}})).unwrap();
        assert!(response.buckets().unwrap().is_empty());
    }

    #[test]
    fn test_missing_histogram_is_malformed() {
        let response = SearchResponse::from_value(json!({"aggregations": {}})).unwrap();
        assert!(matches!(response.buckets(), Err(MeasureError::MalformedResponse(_))));
    }

    #[test]
    fn test_bucket_sub_aggregations() {
        let response = SearchResponse::from_value(json!({
            "aggregations": {"date": {"buckets": [
                {"key": 1000, "doc_count": 2, "stats": {"min": 1.0, "max": 3.0, "avg": 2.0, "count": 2}}
            ]}}
        }))
        .unwrap();
        let buckets = response.buckets().unwrap();
        assert_eq!(buckets.len(), 1);
        let stats: Stats = buckets[0].agg("stats").unwrap();
        assert_eq!(stats.max, Some(3.0));
        assert!(matches!(buckets[0].agg::<Stats>("percentiles"), Err(MeasureError::MalformedResponse(_))));
    }

    #[test]
    fn test_terms_key_accepts_numbers() {
        let terms: Terms = serde_json::from_value(json!({
            "buckets": [{"key": 200, "doc_count": 4}, {"key": "GET", "doc_count": 1}]
        }))
        .unwrap();
        assert_eq!(terms.buckets[0].key(), "200");
        assert_eq!(terms.buckets[1].key(), "GET");
    }

    #[test]
    fn test_percentile_lookup() {
        let p: Percentiles = serde_json::from_value(json!({
            "values": {"95.0": 120.5, "99.0": null}
        }))
        .unwrap();
        assert_eq!(p.get(95.0), Some(120.5));
        assert_eq!(p.get(99.0), None);
    }

    #[test]
    fn test_non_numeric_values_read_as_missing() {
        let p: Percentiles = serde_json::from_value(json!({
            "values": {"95.0": "NaN", "99.0": "12.5"}
        }))
        .unwrap();
        assert_eq!(p.get(95.0), None);
        assert_eq!(p.get(99.0), Some(12.5));

        let stats: Stats = serde_json::from_value(json!({"min": "Infinity", "max": 4, "count": 1})).unwrap();
        assert_eq!((stats.min, stats.max, stats.avg), (None, Some(4.0), None));

        assert!(serde_json::from_value::<SingleValue>(json!({"value": [1]})).is_err());
    }

    #[test]
    fn test_top_hit_sample() {
        let hits: TopHits = serde_json::from_value(json!({
            "hits": {"total": 3, "hits": [{"_source": {"value": 2048.0}, "sort": [60000]}]}
        }))
        .unwrap();
        assert_eq!(hits.sample().unwrap(), Some(Sample { timestamp: 60000, value: 2048.0 }));
    }
}
