//! The closed set of metric kinds and what each one queries and extracts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::query::TIMESTAMP_FIELD;
use crate::reduce::{extract, CompositeKeyFormat, Extractor};
use crate::{MeasureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CpuMax,
    MemMax,
    Swap,
    Netrx,
    Nettx,
    Units,
    RequestsMin,
    ResponseTime,
    TopSlow,
    HttpMethods,
    StatusCode,
    Connections,
}

/// Where per-host network rates are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRateMode {
    /// The store runs the delta script and returns one rate per host.
    #[default]
    Scripted,
    /// The store returns the earliest and latest sample per host.
    Local,
}

impl FromStr for NetworkRateMode {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scripted" => Ok(Self::Scripted),
            "local" => Ok(Self::Local),
            other => Err(MeasureError::InvalidConfig(format!("unknown network rate mode {:?}", other))),
        }
    }
}

/// Knobs that change how some kinds are queried and decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindOptions {
    pub network: NetworkRateMode,
    pub composite: CompositeKeyFormat,
}

const DELTA_INIT_SCRIPT: &str = "_agg['max'] = [ts: 0, val: null]\n_agg['min'] = [ts: 0, val: null]";

const DELTA_MAP_SCRIPT: &str = "ts = doc['@timestamp'][0]
val = doc['value'][0]
if (ts > _agg.max.ts) { _agg.max.ts = ts; _agg.max.val = val }
if (_agg.min.ts == 0 || ts < _agg.min.ts) { _agg.min.ts = ts; _agg.min.val = val }";

const DELTA_REDUCE_SCRIPT: &str = "max = null
min = null
for (a in _aggs) {
    if (max == null || a.max.ts > max.ts) { max = a.max }
    if (min == null || a.min.ts < min.ts) { min = a.min }
}
dt = max.ts - min.ts
if (dt > 0) { return ((max.val - min.val)/1024)/(dt/1000) } else { return 0 }";

fn sample_hit(order: &str) -> Value {
    json!({
        "top_hits": {
            "size": 1,
            "sort": [{ TIMESTAMP_FIELD: { "order": order } }],
            "_source": { "include": ["value"] }
        }
    })
}

fn network_aggregation(mode: NetworkRateMode) -> Value {
    let per_host = match mode {
        NetworkRateMode::Scripted => json!({
            "delta": {
                "scripted_metric": {
                    "init_script": DELTA_INIT_SCRIPT,
                    "map_script": DELTA_MAP_SCRIPT,
                    "reduce_script": DELTA_REDUCE_SCRIPT
                }
            }
        }),
        NetworkRateMode::Local => json!({
            "first": sample_hit("asc"),
            "last": sample_hit("desc")
        }),
    };
    json!({ "units": { "terms": { "field": "host" }, "aggs": per_host } })
}

fn terms(name: &str, field: &str) -> Value {
    json!({ name: { "terms": { "field": field } } })
}

impl MetricKind {
    pub const ALL: [MetricKind; 12] = [
        MetricKind::CpuMax,
        MetricKind::MemMax,
        MetricKind::Swap,
        MetricKind::Netrx,
        MetricKind::Nettx,
        MetricKind::Units,
        MetricKind::RequestsMin,
        MetricKind::ResponseTime,
        MetricKind::TopSlow,
        MetricKind::HttpMethods,
        MetricKind::StatusCode,
        MetricKind::Connections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::CpuMax => "cpu_max",
            MetricKind::MemMax => "mem_max",
            MetricKind::Swap => "swap",
            MetricKind::Netrx => "netrx",
            MetricKind::Nettx => "nettx",
            MetricKind::Units => "units",
            MetricKind::RequestsMin => "requests_min",
            MetricKind::ResponseTime => "response_time",
            MetricKind::TopSlow => "top_slow",
            MetricKind::HttpMethods => "http_methods",
            MetricKind::StatusCode => "status_code",
            MetricKind::Connections => "connections",
        }
    }

    /// Store document type the kind's facts are recorded under.
    pub fn doc_type(&self) -> &'static str {
        match self {
            MetricKind::CpuMax | MetricKind::Units => "cpu_max",
            MetricKind::MemMax => "mem_max",
            MetricKind::Swap => "swap",
            MetricKind::Netrx => "netrx",
            MetricKind::Nettx => "nettx",
            MetricKind::RequestsMin
            | MetricKind::ResponseTime
            | MetricKind::TopSlow
            | MetricKind::HttpMethods
            | MetricKind::StatusCode => "response_time",
            MetricKind::Connections => "connection",
        }
    }

    /// Sub-aggregation nested under the date histogram. `None` keeps the
    /// query builder's default stats aggregation.
    pub fn aggregation(&self, options: &KindOptions) -> Option<Value> {
        match self {
            MetricKind::CpuMax | MetricKind::MemMax | MetricKind::Swap => None,
            MetricKind::Netrx | MetricKind::Nettx => Some(network_aggregation(options.network)),
            MetricKind::Units => Some(json!({ "units": { "cardinality": { "field": "host" } } })),
            MetricKind::RequestsMin => Some(json!({ "sum": { "sum": { "field": "count" } } })),
            MetricKind::ResponseTime => Some(json!({
                "stats": { "stats": { "field": "value" } },
                "percentiles": { "percentiles": { "field": "value" } }
            })),
            MetricKind::TopSlow => Some(json!({
                "top": {
                    "terms": { "script": options.composite.script() },
                    "aggs": { "max": { "max": { "field": "value" } } }
                }
            })),
            MetricKind::HttpMethods => Some(terms("method", "method")),
            MetricKind::StatusCode => Some(terms("status_code", "status_code")),
            MetricKind::Connections => Some(terms("connection", "connection.raw")),
        }
    }

    pub fn extractor(&self, options: &KindOptions) -> Extractor {
        match self {
            MetricKind::CpuMax => extract::stats,
            MetricKind::MemMax | MetricKind::Swap => extract::stats_megabytes,
            MetricKind::Netrx | MetricKind::Nettx => match options.network {
                NetworkRateMode::Scripted => extract::network_scripted,
                NetworkRateMode::Local => extract::network_local,
            },
            MetricKind::Units => extract::units,
            MetricKind::RequestsMin => extract::requests,
            MetricKind::ResponseTime => extract::response_time,
            MetricKind::TopSlow => extract::top_slow,
            MetricKind::HttpMethods => extract::http_methods,
            MetricKind::StatusCode => extract::status_codes,
            MetricKind::Connections => extract::connections,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MeasureError::InvalidRequest(format!("unknown metric kind {:?}", s)))
    }
}
