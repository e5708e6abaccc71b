//! Domain models for stored files and the pending-file ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size sentinel for streaming uploads whose length is only known once the
/// backend has finished writing.
pub const UNKNOWN_SIZE: i64 = -1;

/// Descriptive metadata stored next to the bytes of every object.
///
/// `(category, filename)` is the identity of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub pretty_name: String,
    pub category: String,
    pub content_type: String,
    pub size: i64,
}

impl FileMetadata {
    pub fn size_is_known(&self) -> bool {
        self.size != UNKNOWN_SIZE
    }
}

/// A ledger row marking an upload as not yet committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PendingRecord {
    pub filename: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Projection returned by an expiry sweep; drives backend deletion after the
/// ledger transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FileToDelete {
    pub filename: String,
    pub category: String,
}

/// Requested byte window. `end` is inclusive; `None` means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Bound the window to at most `max_len` bytes starting at `start`.
    ///
    /// An open end is always closed. `max_len == 0` disables clamping.
    pub fn clamp(self, max_len: u64) -> Self {
        if max_len == 0 {
            return self;
        }
        let limit = self.start.saturating_add(max_len - 1);
        let end = match self.end {
            Some(end) if end <= limit => end,
            _ => limit,
        };
        Self {
            start: self.start,
            end: Some(end),
        }
    }

    /// Resolve against the total object size, returning the inclusive
    /// `(start, end)` that can actually be served, or `None` when the window
    /// lies entirely past the end of the content.
    pub fn resolve(&self, total: u64) -> Option<(u64, u64)> {
        if total == 0 || self.start >= total {
            return None;
        }
        if let Some(end) = self.end {
            if end < self.start {
                return None;
            }
        }
        let last = total - 1;
        let end = self.end.map_or(last, |end| end.min(last));
        Some((self.start, end))
    }
}
