//! `Range` request header parsing.
//!
//! Only a single `bytes=start-end` or `bytes=start-` window is supported.
//! Suffix ranges (`bytes=-N`) and multiple ranges are rejected.

use depot_core::{AppError, ByteRange, InvalidArgumentCode};

pub fn invalid_range(reason: &str) -> AppError {
    AppError::invalid_argument(
        InvalidArgumentCode::InvalidRange,
        format!("invalid range header: {}", reason),
    )
}

pub fn parse_range_header(value: &str) -> Result<ByteRange, AppError> {
    let ranges = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| invalid_range("unit must be bytes"))?;

    if ranges.contains(',') {
        return Err(invalid_range("multiple ranges are not supported"));
    }

    let (start, end) = ranges
        .split_once('-')
        .ok_or_else(|| invalid_range("missing '-'"))?;
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        return Err(invalid_range("suffix ranges are not supported"));
    }
    let start: u64 = start.parse().map_err(|_| invalid_range("start is not a number"))?;

    let end = if end.is_empty() {
        None
    } else {
        let end: u64 = end.parse().map_err(|_| invalid_range("end is not a number"))?;
        if end < start {
            return Err(invalid_range("end is before start"));
        }
        Some(end)
    };

    Ok(ByteRange::new(start, end))
}
