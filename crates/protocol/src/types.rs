use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_T1_ADJUSTED_INDEX, DEFAULT_T1_NORMAL_INDEX, DEFAULT_T2_ADJUSTED_INDEX,
    DEFAULT_T2_NORMAL_INDEX,
};

// ---------------------------------------------------------------------------
// ChunkRange
// ---------------------------------------------------------------------------

/// Error produced when building or parsing a [`ChunkRange`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("malformed content range: {0}")]
    Malformed(String),

    #[error("range {start}-{end} out of bounds for total {total}")]
    OutOfBounds { start: u64, end: u64, total: u64 },
}

/// Inclusive byte range of one upload chunk plus the file's total size.
///
/// Rendered as the `Content-Range` header value `bytes <start>-<end>/<total>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ChunkRange {
    /// Creates a validated range. Requires `start <= end < total`.
    pub fn new(start: u64, end: u64, total: u64) -> Result<Self, RangeError> {
        if start > end || end >= total {
            return Err(RangeError::OutOfBounds { start, end, total });
        }
        Ok(Self { start, end, total })
    }

    /// Returns the chunk that starts at `offset`, or `None` once the whole
    /// file is covered.
    ///
    /// Every chunk is `chunk_size` bytes except the final one, which ends at
    /// `total - 1`.
    pub fn next(offset: u64, chunk_size: u64, total: u64) -> Option<Self> {
        if chunk_size == 0 || offset >= total {
            return None;
        }
        let end = offset.saturating_add(chunk_size).min(total) - 1;
        Some(Self {
            start: offset,
            end,
            total,
        })
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A range always covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Offset of the first byte after this range.
    pub fn end_exclusive(&self) -> u64 {
        self.end + 1
    }

    /// Returns `true` if this is the final chunk of the file.
    pub fn is_last(&self) -> bool {
        self.end + 1 == self.total
    }

    /// `Content-Range` header value.
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

impl FromStr for ChunkRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());

        let rest = s.trim().strip_prefix("bytes ").ok_or_else(malformed)?;
        let (span, total) = rest.split_once('/').ok_or_else(malformed)?;
        let (start, end) = span.split_once('-').ok_or_else(malformed)?;

        let start: u64 = start.parse().map_err(|_| malformed())?;
        let end: u64 = end.parse().map_err(|_| malformed())?;
        let total: u64 = total.parse().map_err(|_| malformed())?;
        Self::new(start, end, total)
    }
}

// ---------------------------------------------------------------------------
// IndexNames
// ---------------------------------------------------------------------------

/// Elasticsearch target indices for the four generated tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNames {
    #[serde(default = "default_t1_normal")]
    pub t1_normal: String,
    #[serde(default = "default_t1_adjusted")]
    pub t1_adjusted: String,
    #[serde(default = "default_t2_normal")]
    pub t2_normal: String,
    #[serde(default = "default_t2_adjusted")]
    pub t2_adjusted: String,
}

fn default_t1_normal() -> String {
    DEFAULT_T1_NORMAL_INDEX.into()
}

fn default_t1_adjusted() -> String {
    DEFAULT_T1_ADJUSTED_INDEX.into()
}

fn default_t2_normal() -> String {
    DEFAULT_T2_NORMAL_INDEX.into()
}

fn default_t2_adjusted() -> String {
    DEFAULT_T2_ADJUSTED_INDEX.into()
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            t1_normal: default_t1_normal(),
            t1_adjusted: default_t1_adjusted(),
            t2_normal: default_t2_normal(),
            t2_adjusted: default_t2_adjusted(),
        }
    }
}

impl IndexNames {
    /// Returns the name of the first empty slot, if any.
    pub fn first_empty(&self) -> Option<&'static str> {
        [
            ("t1_normal", &self.t1_normal),
            ("t1_adjusted", &self.t1_adjusted),
            ("t2_normal", &self.t2_normal),
            ("t2_adjusted", &self.t2_adjusted),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
    }
}
