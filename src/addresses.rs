//! The user-maintained list of addresses to extract.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::{AppError, AppResult};

pub const SAMPLE_ADDRESSES: &str = "\
# Email addresses to extract (one per line)
# Lines starting with # are ignored
# Email addresses are case-insensitive and will be normalized to lowercase
# Duplicates will be automatically removed

example1@gmail.com
example2@company.com
";

/// Trim, lowercase and dedupe the lines of an address file, keeping the
/// order of first appearance. Blank lines and `#` comments are dropped.
pub fn normalize_addresses(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|email| !email.is_empty() && !email.starts_with('#'))
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

pub fn load_addresses(path: &Path) -> AppResult<Vec<String>> {
    if !path.exists() {
        return Err(AppError::AddressFileMissing(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    let addresses = normalize_addresses(&text);
    if addresses.is_empty() {
        return Err(AppError::NoAddresses(path.to_path_buf()));
    }
    debug!(path = %path.display(), count = addresses.len(), "Loaded address list");
    Ok(addresses)
}

/// Number of non-blank, non-comment lines; `None` when the file is absent.
pub fn count_addresses(path: &Path) -> AppResult<Option<usize>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    let count = text
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .count();
    Ok(Some(count))
}

/// Write the commented sample file. Returns `false` when the file already
/// exists and `overwrite` is not set.
pub fn write_sample(path: &Path, overwrite: bool) -> AppResult<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    }
    fs::write(path, SAMPLE_ADDRESSES).map_err(|e| AppError::io(path, e))?;
    Ok(true)
}
