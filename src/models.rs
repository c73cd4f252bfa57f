use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

use crate::kind::MetricKind;
use crate::query::{DateRange, Interval};

/// Application metadata as known to the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    #[serde(default)]
    pub envs: HashMap<String, String>,
}

impl AppInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), envs: HashMap::new() }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct MetricRequest {
    pub app: AppInfo,
    pub process: Option<String>,
    pub range: Option<DateRange>,
    pub interval: Option<Interval>,
    pub kind: MetricKind,
}

impl MetricRequest {
    pub fn new(app: AppInfo, kind: MetricKind) -> Self {
        Self { app, process: None, range: None, interval: None, kind }
    }

    /// Same app, process and window, different kind.
    pub fn for_kind(&self, kind: MetricKind) -> Self {
        Self { kind, ..self.clone() }
    }
}

/// Where a request's queries go. Resolved per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub url: String,
    pub index: String,
}

impl BackendDescriptor {
    pub fn search_url(&self, doc_type: &str) -> String {
        format!("{}/{}/{}/_search", self.url, self.index, doc_type)
    }
}

/// Largest magnitude an `f64` holds without losing integer precision.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Whole numbers go out as JSON integers (`7`, not `7.0`).
fn chart_number<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

struct ChartValue(Option<f64>);

impl Serialize for ChartValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.0 {
            Some(v) => chart_number(v, serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// One chart point: `[timestamp, value, extras...]` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub timestamp: i64,
    pub value: Option<f64>,
    pub extras: Vec<String>,
}

impl Point {
    pub fn new(timestamp: i64, value: Option<f64>) -> Self {
        Self { timestamp, value, extras: Vec::new() }
    }

    pub fn with_extras(mut self, extras: Vec<String>) -> Self {
        self.extras = extras;
        self
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2 + self.extras.len()))?;
        seq.serialize_element(&self.timestamp)?;
        seq.serialize_element(&ChartValue(self.value))?;
        for extra in &self.extras {
            seq.serialize_element(extra)?;
        }
        seq.end()
    }
}

/// Named series, kept sorted so output is deterministic.
pub type SeriesSet = BTreeMap<String, Vec<Point>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesResult {
    pub data: SeriesSet,
    #[serde(serialize_with = "chart_number")]
    pub min: f64,
    #[serde(serialize_with = "chart_number")]
    pub max: f64,
}

impl SeriesResult {
    pub fn empty() -> Self {
        Self { data: SeriesSet::new(), min: 0.0, max: 1.0 }
    }
}
