//! Filesystem-safe names for output files and attachments.

use std::path::{Path, PathBuf};

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_CHARS: usize = 200;

/// Longest file name, in bytes, that ext4, APFS and friends accept.
pub const MAX_NAME_BYTES: usize = 255;

/// Replace characters that are unsafe on common filesystems with `_` and cap
/// the length at 200 characters. Everything else, Unicode included, is kept.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// Split `name` into stem and extension (with its dot). Leading dots belong
/// to the stem, so `.bashrc` has no extension and `a.tar.gz` splits at `.gz`.
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(pos) => name.split_at(leading + pos),
        None => (name, ""),
    }
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char
/// boundary.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Shorten `name` to at most `max_bytes`, cutting the stem and keeping the
/// extension when there is room for it.
pub fn fit_filename(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    if ext.len() * 2 > max_bytes {
        return truncate_bytes(name, max_bytes).to_string();
    }
    format!("{}{ext}", truncate_bytes(stem, max_bytes - ext.len()))
}

/// First path in `dir` for `name` that does not exist yet: `name`, then
/// `stem_1.ext`, `stem_2.ext` and so on.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = split_extension(name);
    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
