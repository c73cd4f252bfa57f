//! Store query construction.

pub mod builder;
pub mod filter;
pub mod range;

pub use builder::build_query;
pub use filter::{build_filter, FilterExpression, TIMESTAMP_FIELD};
pub use range::{DateRange, IndexStrategy, Interval, DEFAULT_DATE_RANGE, DEFAULT_INTERVAL};
