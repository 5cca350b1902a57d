//! Standalone HTML page for one message.

use crate::mime::escape_html;

/// Header values shown above the body.
#[derive(Debug, Clone, Default)]
pub struct HeaderBlock<'a> {
    pub subject: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub cc: &'a str,
    pub date: &'a str,
}

const STYLE: &str = r#"        .email-header {
            background-color: #f0f0f0;
            padding: 15px;
            margin-bottom: 20px;
            border-radius: 5px;
            font-family: Arial, sans-serif;
        }
        .email-header p {
            margin: 5px 0;
        }
        .email-header strong {
            display: inline-block;
            width: 80px;
        }"#;

/// Header values are escaped; `body_html` is inserted as-is.
pub fn render_html(meta: &HeaderBlock<'_>, body_html: &str) -> String {
    let subject = escape_html(meta.subject);
    let cc_line = if meta.cc.is_empty() {
        String::new()
    } else {
        format!("<p><strong>Cc:</strong> {}</p>", escape_html(meta.cc))
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{subject}</title>
    <style>
{STYLE}
    </style>
</head>
<body>
    <div class="email-header">
        <p><strong>Subject:</strong> {subject}</p>
        <p><strong>From:</strong> {from}</p>
        <p><strong>To:</strong> {to}</p>
        {cc_line}
        <p><strong>Date:</strong> {date}</p>
    </div>
    <div class="email-body">
        {body_html}
    </div>
</body>
</html>"#,
        from = escape_html(meta.from),
        to = escape_html(meta.to),
        date = escape_html(meta.date),
    )
}
