//! Per-kind bucket extractors.
//!
//! Each function consumes the running series set and one histogram bucket
//! and hands back the updated set with the bounds that bucket contributed.

use crate::kind::KindOptions;
use crate::models::{Point, SeriesSet};
use crate::Result;

use super::response::{Bucket, Percentiles, Sample, SingleValue, Stats, Terms, TopHits};
use super::BucketBounds;

pub const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

fn push(acc: &mut SeriesSet, series: &str, point: Point) {
    acc.entry(series.to_string()).or_default().push(point);
}

fn push_stats(acc: &mut SeriesSet, key: i64, stats: Stats, scale: f64) -> BucketBounds {
    let scaled = |v: Option<f64>| v.map(|v| v / scale);
    let (min, max, avg) = (scaled(stats.min), scaled(stats.max), scaled(stats.avg));
    push(acc, "max", Point::new(key, max));
    push(acc, "min", Point::new(key, min));
    push(acc, "avg", Point::new(key, avg));
    BucketBounds { min, max }
}

fn stats_scaled(mut acc: SeriesSet, bucket: &Bucket, scale: f64) -> Result<(SeriesSet, BucketBounds)> {
    let stats: Stats = bucket.agg("stats")?;
    let bounds = push_stats(&mut acc, bucket.key, stats, scale);
    Ok((acc, bounds))
}

/// min/max/avg passed through unchanged.
pub fn stats(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    stats_scaled(acc, bucket, 1.0)
}

/// min/max/avg converted from bytes to megabytes.
pub fn stats_megabytes(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    stats_scaled(acc, bucket, BYTES_PER_MEGABYTE)
}

pub fn response_time(mut acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    let stats: Stats = bucket.agg("stats")?;
    let percentiles: Percentiles = bucket.agg("percentiles")?;
    let bounds = push_stats(&mut acc, bucket.key, stats, 1.0);
    push(&mut acc, "p95", Point::new(bucket.key, percentiles.get(95.0)));
    push(&mut acc, "p99", Point::new(bucket.key, percentiles.get(99.0)));
    Ok((acc, bounds))
}

fn single_value(
    mut acc: SeriesSet,
    bucket: &Bucket,
    agg: &str,
    series: &str,
) -> Result<(SeriesSet, BucketBounds)> {
    let value = bucket.agg::<SingleValue>(agg)?.value;
    push(&mut acc, series, Point::new(bucket.key, value));
    Ok((acc, BucketBounds::point(value)))
}

/// Distinct hosts reporting in the bucket.
pub fn units(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    single_value(acc, bucket, "units", "units")
}

/// Summed request counter.
pub fn requests(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    single_value(acc, bucket, "sum", "requests")
}

/// KB/s between two counter readings; 0 when they share a timestamp.
pub fn delta_rate(first: Sample, last: Sample) -> f64 {
    let elapsed_ms = last.timestamp - first.timestamp;
    if elapsed_ms > 0 {
        ((last.value - first.value) / 1024.0) / (elapsed_ms as f64 / 1000.0)
    } else {
        0.0
    }
}

fn push_network(mut acc: SeriesSet, key: i64, value: f64) -> (SeriesSet, BucketBounds) {
    push(&mut acc, "requests", Point::new(key, Some(value)));
    (acc, BucketBounds::point(Some(value)))
}

/// Sums the per-host rates the store computed in its `delta` script.
pub fn network_scripted(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    let hosts: Terms = bucket.agg("units")?;
    let mut total = 0.0;
    for host in &hosts.buckets {
        total += host.agg::<SingleValue>("delta")?.value.unwrap_or(0.0);
    }
    Ok(push_network(acc, bucket.key, total))
}

/// Computes per-host rates from the earliest and latest samples the store
/// returned, then sums them.
pub fn network_local(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    let hosts: Terms = bucket.agg("units")?;
    let mut total = 0.0;
    for host in &hosts.buckets {
        let first = host.agg::<TopHits>("first")?.sample()?;
        let last = host.agg::<TopHits>("last")?.sample()?;
        if let (Some(first), Some(last)) = (first, last) {
            total += delta_rate(first, last);
        }
    }
    Ok(push_network(acc, bucket.key, total))
}

/// Slowest response per decoded request path, tagged with status and method.
/// The chart floor stays at zero.
pub fn top_slow(mut acc: SeriesSet, bucket: &Bucket, options: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    let groups: Terms = bucket.agg("top")?;
    let mut slowest = 0.0_f64;
    for group in &groups.buckets {
        let composite = options.composite.parse(&group.key())?;
        let response_time = group.agg::<SingleValue>("max")?.value;
        slowest = response_time.map_or(slowest, |v| slowest.max(v));
        let point = Point::new(bucket.key, response_time)
            .with_extras(vec![composite.status_code, composite.method]);
        push(&mut acc, &composite.path, point);
    }
    Ok((acc, BucketBounds { min: Some(0.0), max: Some(slowest) }))
}

/// One series per category, valued by document count. Categories absent
/// from a bucket get no point there.
fn categorical(mut acc: SeriesSet, bucket: &Bucket, agg: &str) -> Result<(SeriesSet, BucketBounds)> {
    let terms: Terms = bucket.agg(agg)?;
    let mut bounds = BucketBounds::default();
    for term in &terms.buckets {
        let count = term.doc_count as f64;
        bounds = bounds.widen(Some(count));
        push(&mut acc, &term.key(), Point::new(bucket.key, Some(count)));
    }
    Ok((acc, bounds))
}

pub fn http_methods(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    categorical(acc, bucket, "method")
}

pub fn status_codes(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    categorical(acc, bucket, "status_code")
}

pub fn connections(acc: SeriesSet, bucket: &Bucket, _: &KindOptions) -> Result<(SeriesSet, BucketBounds)> {
    categorical(acc, bucket, "connection")
}
