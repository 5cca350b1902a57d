//! Walking Gmail's MIME part tree: headers, bodies and attachments.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::gmail::{Header, MessagePart};

/// Where the bytes of an attachment come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Must be fetched with the attachments endpoint.
    Remote(String),
    /// Base64url data embedded in the part body.
    Inline(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    pub mime_type: String,
    pub source: AttachmentSource,
}

/// Case-insensitive header lookup; empty when absent.
pub fn header<'a>(headers: &'a [Header], name: &str) -> &'a str {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .unwrap_or("")
}

/// Gmail uses the URL-safe alphabet and is inconsistent about padding.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    if trimmed.ends_with('=') {
        URL_SAFE.decode(trimmed.as_bytes())
    } else {
        URL_SAFE_NO_PAD.decode(trimmed.as_bytes())
    }
}

fn decode_text(data: &str) -> Option<String> {
    decode_base64url(data)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn is_multipart(part: &MessagePart) -> bool {
    !part.parts.is_empty() || part.mime_type.to_ascii_lowercase().starts_with("multipart/")
}

/// Depth-first search for the first inline body of `mime_type`, skipping
/// anything that is really an attachment.
fn find_body(part: &MessagePart, mime_type: &str) -> Option<String> {
    if is_multipart(part) {
        return part.parts.iter().find_map(|child| find_body(child, mime_type));
    }
    if !part.filename.is_empty() || !part.mime_type.eq_ignore_ascii_case(mime_type) {
        return None;
    }
    part.body.data.as_deref().and_then(decode_text)
}

pub fn text_body(payload: &MessagePart) -> String {
    find_body(payload, "text/plain").unwrap_or_default()
}

/// HTML body of a message. Plain-text-only messages are escaped and wrapped
/// in `<pre>`; messages with neither give an empty string.
pub fn html_body(payload: &MessagePart) -> String {
    if let Some(html) = find_body(payload, "text/html") {
        return html;
    }
    let text = text_body(payload);
    if text.is_empty() {
        return String::new();
    }
    format!("<html><body><pre>{}</pre></body></html>", escape_html(&text))
}

/// Every leaf with a filename, at any depth, in document order.
pub fn collect_attachments(payload: &MessagePart) -> Vec<AttachmentRef> {
    let mut found = Vec::new();
    walk_attachments(payload, &mut found);
    found
}

fn walk_attachments(part: &MessagePart, found: &mut Vec<AttachmentRef>) {
    if !part.parts.is_empty() {
        for child in &part.parts {
            walk_attachments(child, found);
        }
        return;
    }
    if part.filename.is_empty() {
        return;
    }
    let source = match (&part.body.attachment_id, &part.body.data) {
        (Some(id), _) if !id.is_empty() => AttachmentSource::Remote(id.clone()),
        (_, Some(data)) => AttachmentSource::Inline(data.clone()),
        _ => return,
    };
    found.push(AttachmentRef {
        filename: part.filename.clone(),
        mime_type: part.mime_type.clone(),
        source,
    });
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
