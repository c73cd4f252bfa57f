//! Folds a bucketed store response into chart-ready series.

pub mod composite;
pub mod extract;
pub mod response;

use serde_json::Value;
use tracing::debug;

use crate::kind::KindOptions;
use crate::models::{SeriesResult, SeriesSet};
use crate::Result;

pub use composite::{CompositeKey, CompositeKeyFormat};
pub use response::{Bucket, SearchResponse};

/// Smallest and largest value a bucket contributed, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BucketBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl BucketBounds {
    pub fn point(value: Option<f64>) -> Self {
        Self { min: value, max: value }
    }

    pub fn widen(self, value: Option<f64>) -> Self {
        let Some(v) = value else { return self };
        Self {
            min: Some(self.min.map_or(v, |m| m.min(v))),
            max: Some(self.max.map_or(v, |m| m.max(v))),
        }
    }
}

/// Per-kind extraction step of the fold.
pub type Extractor = fn(SeriesSet, &Bucket, &KindOptions) -> Result<(SeriesSet, BucketBounds)>;

/// Runs `extractor` over every histogram bucket in store order.
///
/// The global minimum is the smallest bucket minimum (0 if none was
/// reported); the global maximum starts at 0 and is reported with one unit
/// of headroom.
pub fn reduce(raw: Value, extractor: Extractor, options: &KindOptions) -> Result<SeriesResult> {
    let buckets = SearchResponse::from_value(raw)?.buckets()?;
    if buckets.is_empty() {
        return Ok(SeriesResult::empty());
    }
    debug!(buckets = buckets.len(), "reducing histogram");

    let (data, min, max) = buckets.iter().try_fold(
        (SeriesSet::new(), None::<f64>, 0.0_f64),
        |(acc, min, max), bucket| {
            let (acc, bounds) = extractor(acc, bucket, options)?;
            let min = match (min, bounds.min) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let max = bounds.max.map_or(max, |b| max.max(b));
            Ok::<_, crate::MeasureError>((acc, min, max))
        },
    )?;

    Ok(SeriesResult { data, min: min.unwrap_or(0.0), max: max + 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;
    use crate::MeasureError;
    use serde_json::json;

    fn passthrough(mut acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
        let value = bucket.doc_count as f64 - 5.0;
        acc.entry("docs".into()).or_default().push(Point::new(bucket.key, Some(value)));
        Ok((acc, BucketBounds::point(Some(value))))
    }

    fn failing(_: SeriesSet, _: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
        Err(MeasureError::MalformedResponse("boom".into()))
    }

    #[test]
    fn test_empty_buckets() {
        let raw = json!({"aggregations": {"date": {"buckets": []}}});
        let result = reduce(raw, passthrough, &KindOptions::default()).unwrap();
        assert_eq!(result, SeriesResult::empty());
    }

    #[test]
    fn test_bounds_fold() {
        let raw = json!({"aggregations": {"date": {"buckets": [
            {"key": 1, "doc_count": 7},
            {"key": 2, "doc_count": 3},
            {"key": 3, "doc_count": 9}
        ]}}});
        let result = reduce(raw, passthrough, &KindOptions::default()).unwrap();
        assert_eq!(result.min, -2.0);
        assert_eq!(result.max, 5.0);
        let keys: Vec<i64> = result.data["docs"].iter().map(|p| p.timestamp).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn test_max_never_below_zero_headroom() {
        let raw = json!({"aggregations": {"date": {"buckets": [{"key": 1, "doc_count": 1}]}}});
        let result = reduce(raw, passthrough, &KindOptions::default()).unwrap();
        assert_eq!(result.min, -4.0);
        assert_eq!(result.max, 1.0);
    }

    #[test]
    fn test_extractor_error_propagates() {
        let raw = json!({"aggregations": {"date": {"buckets": [{"key": 1}]}}});
        assert!(matches!(
            reduce(raw, failing, &KindOptions::default()),
            Err(MeasureError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_bounds_widen_ignores_missing() {
        let bounds = BucketBounds::default().widen(Some(3.0)).widen(None).widen(Some(1.0));
        assert_eq!(bounds, BucketBounds { min: Some(1.0), max: Some(3.0) });
    }
}
