//! The per-address `emails.csv` index.
//!
//! RFC 4180: comma separated, CRLF line endings, fields quoted only when
//! they contain a comma, quote or line break.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::{AppError, AppResult};

pub const CSV_COLUMNS: [&str; 8] = [
    "Filename",
    "Subject",
    "From",
    "To",
    "Cc",
    "Date",
    "Message ID",
    "Attachments",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    pub filename: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub date: String,
    pub message_id: String,
    pub attachments: Vec<String>,
}

impl CsvRow {
    fn fields(&self) -> [String; 8] {
        [
            self.filename.clone(),
            self.subject.clone(),
            self.from.clone(),
            self.to.clone(),
            self.cc.clone(),
            self.date.clone(),
            self.message_id.clone(),
            self.attachments.join(", "),
        ]
    }
}

pub fn write_csv(path: &Path, rows: &[CsvRow]) -> AppResult<()> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let io = |e| AppError::io(path, e);

    write_record(&mut out, CSV_COLUMNS.iter().map(|c| c.to_string())).map_err(io)?;
    for row in rows {
        write_record(&mut out, row.fields().into_iter()).map_err(io)?;
    }
    out.flush().map_err(io)
}

fn write_record<W: Write>(out: &mut W, fields: impl Iterator<Item = String>) -> std::io::Result<()> {
    let line = fields.map(|f| csv_escape(&f)).collect::<Vec<_>>().join(",");
    write!(out, "{line}\r\n")
}

pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
