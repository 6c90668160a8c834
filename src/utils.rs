use std::path::Path;

use crate::error::{InterpretError, Result};

/// Indices of every haystack entry containing the needle, ignoring case
pub fn index_mask(needle: &str, haystack: &[String]) -> Vec<usize> {
    let needle = needle.to_lowercase();
    haystack
        .iter()
        .enumerate()
        .filter(|(_, target)| target.to_lowercase().contains(&needle))
        .map(|(i, _)| i)
        .collect()
}

pub fn select_indices<T: Copy>(indices: &[usize], data: &[T]) -> Vec<T> {
    indices.iter().map(|i| data[*i]).collect()
}

/// Row keys are compared as trimmed strings
pub fn normalize_key(key: &str) -> String {
    key.trim().to_string()
}

/// Extracts the model seed from a weight file name of the form `<prefix>_<seed>_...`
pub fn seed_from_file_name(path: &Path) -> Result<u64> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('_').nth(1))
        .and_then(|token| token.parse::<u64>().ok())
        .ok_or_else(|| InterpretError::MalformedFileName(path.to_path_buf()))
}
