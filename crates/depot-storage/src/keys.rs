//! Shared key validation for storage backends.

use crate::traits::{StorageError, StorageResult};

/// Validate a single key segment (category or filename).
pub fn validate_segment(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{} must not be empty", kind)));
    }
    if value.starts_with('.')
        || value.contains(['/', '\\', '\0'])
        || value.contains("..")
    {
        return Err(StorageError::InvalidKey(format!(
            "{} contains invalid characters",
            kind
        )));
    }
    Ok(())
}

/// Validate both halves of a `(category, filename)` key.
pub fn validate_key(category: &str, filename: &str) -> StorageResult<()> {
    validate_segment("category", category)?;
    validate_segment("filename", filename)
}

/// Human-readable form used in logs and error messages.
pub fn display_key(category: &str, filename: &str) -> String {
    format!("{}/{}", category, filename)
}

/// S3 bucket naming: 3-63 chars of lowercase letters, digits, `-` and `.`,
/// starting and ending with a letter or digit.
pub fn validate_bucket_name(bucket: &str) -> StorageResult<()> {
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());
    if !(3..=63).contains(&bucket.len()) || !valid_chars || !valid_edges {
        return Err(StorageError::InvalidKey(format!(
            "'{}' is not a valid bucket name",
            bucket
        )));
    }
    Ok(())
}
