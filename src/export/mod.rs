//! Turning fetched messages into files: HTML pages and the CSV index.
mod csv;
mod html;

pub use csv::{csv_escape, write_csv, CsvRow, CSV_COLUMNS};
pub use html::{render_html, HeaderBlock};

use chrono::{DateTime, Utc};

use crate::sanitize::{sanitize_filename, truncate_bytes, MAX_NAME_BYTES};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a `Date:` header as `YYYY-MM-DD HH:MM:SS` in the sender's own
/// offset. Falls back to mailparse's lenient parser (UTC) and finally to the
/// raw header.
pub fn format_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return dt.format(DATE_FORMAT).to_string();
    }
    // dateparse gives 0 for input it could not make sense of
    mailparse::dateparse(trimmed)
        .ok()
        .filter(|ts| *ts > 0)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// `0007_Quarterly report`: 1-based index plus sanitized subject, shared by
/// the HTML file and the attachment folder of a message. Short enough that
/// `<stem>.html` stays within the filesystem's name limit.
pub fn message_stem(index: usize, subject: &str) -> String {
    let subject = if subject.is_empty() { "no_subject" } else { subject };
    let prefix = format!("{index:04}_");
    let budget = MAX_NAME_BYTES - prefix.len() - HTML_EXT.len();
    let subject = sanitize_filename(subject);
    format!("{prefix}{}", truncate_bytes(&subject, budget))
}

pub const HTML_EXT: &str = ".html";
