//! Relative time tokens (`1h`, `7d`, `1m`) in the store's date-math syntax.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MeasureError, Result};

/// Window used when the caller does not pick one.
pub const DEFAULT_DATE_RANGE: &str = "1h";

/// Histogram bucket width used when the caller does not pick one.
pub const DEFAULT_INTERVAL: &str = "1m";

const UNITS: &[char] = &['s', 'm', 'h', 'd', 'w', 'M', 'y'];

/// Validates `<digits><unit>`, returning the token untouched.
fn parse_token(token: &str, what: &str) -> Result<String> {
    let token = token.trim();
    let valid = match token.char_indices().last() {
        Some((unit_at, unit)) => {
            let amount = &token[..unit_at];
            !amount.is_empty()
                && amount.bytes().all(|b| b.is_ascii_digit())
                && UNITS.contains(&unit)
        }
        None => false,
    };

    if !valid {
        return Err(MeasureError::InvalidRequest(format!(
            "invalid {} token {:?}",
            what, token
        )));
    }
    Ok(token.to_string())
}

/// How far back a request looks, e.g. `1h` or `7d`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange(String);

impl DateRange {
    pub fn parse(token: &str) -> Result<Self> {
        parse_token(token, "date range").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_DATE_RANGE
    }

    /// Lower bound of the range in store date math.
    pub fn lower_bound(&self) -> String {
        format!("now-{}", self.0)
    }

    pub fn index_strategy(&self) -> IndexStrategy {
        if self.is_default() {
            IndexStrategy::Daily
        } else {
            IndexStrategy::YearlyWildcard
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self(DEFAULT_DATE_RANGE.to_string())
    }
}

/// Width of a histogram bucket, e.g. `1m` or `1h`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval(String);

impl Interval {
    pub fn parse(token: &str) -> Result<Self> {
        parse_token(token, "interval").map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL.to_string())
    }
}

/// Which index pattern a query targets.
///
/// Short windows hit the single daily index, anything longer fans out over
/// every index of the current year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    Daily,
    YearlyWildcard,
}

macro_rules! token_impls {
    ($ty:ident) => {
        impl FromStr for $ty {
            type Err = MeasureError;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

token_impls!(DateRange);
token_impls!(Interval);
