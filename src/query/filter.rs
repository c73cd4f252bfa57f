//! Boolean filter shared by every metric query.

use serde_json::{json, Value};

use super::range::DateRange;

/// Field holding the measurement timestamp.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Predicate tree rendered into the store's `filtered` query.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Term { field: String, value: String },
    Range { field: String, gte: String, lt: String },
    Should(Vec<FilterExpression>),
    Must(Vec<FilterExpression>),
}

impl FilterExpression {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpression::Term { field: field.into(), value: value.into() }
    }

    /// `field` OR `field.raw` equal to `value`. Text fields are indexed both
    /// analyzed and raw, so exact matches need both.
    pub fn analyzed_or_raw(field: &str, value: &str) -> Self {
        FilterExpression::Should(vec![
            Self::term(field, value),
            Self::term(format!("{}.raw", field), value),
        ])
    }

    pub fn timestamp_within(range: &DateRange) -> Self {
        FilterExpression::Range {
            field: TIMESTAMP_FIELD.to_string(),
            gte: range.lower_bound(),
            lt: "now".to_string(),
        }
    }

    /// Renders the expression in the store's query DSL.
    pub fn to_json(&self) -> Value {
        match self {
            FilterExpression::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            FilterExpression::Range { field, gte, lt } => {
                json!({ "range": { field.as_str(): { "gte": gte, "lt": lt } } })
            }
            FilterExpression::Should(clauses) => json!({
                "bool": { "should": clauses.iter().map(Self::to_json).collect::<Vec<_>>() }
            }),
            FilterExpression::Must(clauses) => json!({
                "bool": { "must": clauses.iter().map(Self::to_json).collect::<Vec<_>>() }
            }),
        }
    }
}

/// Builds the app/process/time filter for a request.
///
/// A missing range falls back to [`DateRange::default`], the same window the
/// backend selector uses to pick the daily index.
pub fn build_filter(app: &str, process: Option<&str>, range: Option<&DateRange>) -> FilterExpression {
    let default_range = DateRange::default();
    let range = range.unwrap_or(&default_range);

    let mut must = vec![
        FilterExpression::analyzed_or_raw("app", app),
        FilterExpression::timestamp_within(range),
    ];
    if let Some(process) = process.filter(|p| !p.is_empty()) {
        must.push(FilterExpression::analyzed_or_raw("process", process));
    }
    FilterExpression::Must(must)
}
