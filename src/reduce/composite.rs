//! Composite terms keys: `method<sep>path<sep>status` packed into one term
//! so a single terms aggregation can group by all three fields.

use serde::Serialize;

use crate::{MeasureError, Result};

/// Unit separator; never appears in methods, URL paths or status codes.
pub const DEFAULT_DELIMITER: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeKey {
    pub method: String,
    pub path: String,
    pub status_code: String,
}

/// Encoding shared by the store-side script and the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeKeyFormat {
    delimiter: char,
}

impl Default for CompositeKeyFormat {
    fn default() -> Self {
        Self { delimiter: DEFAULT_DELIMITER }
    }
}

impl CompositeKeyFormat {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Terms script producing keys this format can parse.
    pub fn script(&self) -> String {
        let sep = format!("\\u{:04x}", self.delimiter as u32);
        format!(
            "doc['method'].value + '{sep}' + doc['path.raw'].value + '{sep}' + doc['status_code'].value"
        )
    }

    pub fn encode(&self, method: &str, path: &str, status_code: &str) -> String {
        let d = self.delimiter;
        format!("{method}{d}{path}{d}{status_code}")
    }

    /// Reads the status as the trailing three digits and the method as the
    /// leading word characters. When the delimiter is itself a word
    /// character the method ends at the last delimiter inside that leading
    /// run, so `PUTU/xU200` with `U` reads as `PUT`. The path is whatever
    /// follows the method's delimiter, delimiters included.
    pub fn parse(&self, key: &str) -> Result<CompositeKey> {
        let malformed = || MeasureError::MalformedCompositeKey { key: key.to_string() };

        let split = key.len().checked_sub(3).ok_or_else(malformed)?;
        if !key.is_char_boundary(split) {
            return Err(malformed());
        }
        let (head, status_code) = key.split_at(split);
        if !status_code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let head = head.strip_suffix(self.delimiter).ok_or_else(malformed)?;

        let word_len: usize = head
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum();
        let method_end = head
            .match_indices(self.delimiter)
            .map(|(i, _)| i)
            .filter(|&i| i > 0 && i <= word_len)
            .last()
            .ok_or_else(malformed)?;

        let (method, path) = head.split_at(method_end);
        Ok(CompositeKey {
            method: method.to_string(),
            path: path[self.delimiter.len_utf8()..].to_string(),
            status_code: status_code.to_string(),
        })
    }
}
