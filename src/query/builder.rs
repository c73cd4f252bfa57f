use serde_json::{json, Value};

use super::filter::{FilterExpression, TIMESTAMP_FIELD};
use super::range::Interval;

/// Aggregation used when a kind brings none of its own.
pub fn default_aggregation() -> Value {
    json!({ "stats": { "stats": { "field": "value" } } })
}

/// Wraps `aggregation` in a `date` histogram over the filtered documents.
///
/// `size` is 0: only aggregations are read back, never hits.
pub fn build_query(filter: &FilterExpression, interval: Option<&Interval>, aggregation: Option<Value>) -> Value {
    let default_interval = Interval::default();
    let interval = interval.unwrap_or(&default_interval);
    let aggregation = aggregation.unwrap_or_else(default_aggregation);

    json!({
        "query": { "filtered": { "filter": filter.to_json() } },
        "size": 0,
        "aggs": {
            "date": {
                "date_histogram": {
                    "field": TIMESTAMP_FIELD,
                    "interval": interval.as_str()
                },
                "aggs": aggregation
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::build_filter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let filter = build_filter("foo", None, None);
        let query = build_query(&filter, None, None);
        assert_eq!(
            query,
            json!({
                "query": {"filtered": {"filter": filter.to_json()}},
                "size": 0,
                "aggs": {
                    "date": {
                        "date_histogram": {"field": "@timestamp", "interval": "1m"},
                        "aggs": {"stats": {"stats": {"field": "value"}}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_custom_interval_and_aggregation() {
        let filter = build_filter("foo", Some("web"), None);
        let interval = Interval::parse("1h").unwrap();
        let agg = json!({"units": {"cardinality": {"field": "host"}}});
        let query = build_query(&filter, Some(&interval), Some(agg.clone()));
        assert_eq!(query["aggs"]["date"]["date_histogram"]["interval"], "1h");
        assert_eq!(query["aggs"]["date"]["aggs"], agg);
        assert_eq!(query["size"], 0);
    }
}
