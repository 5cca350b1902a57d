//! Per-address extraction: list, fetch, render, index.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::export::{
    format_date, message_stem, render_html, write_csv, CsvRow, HeaderBlock, HTML_EXT,
};
use crate::gmail::{build_query, list_all_message_ids, MailApi, Message};
use crate::mime::{collect_attachments, decode_base64url, header, html_body, AttachmentRef, AttachmentSource};
use crate::sanitize::{fit_filename, sanitize_filename, unique_path, MAX_NAME_BYTES};

pub const CSV_FILE: &str = "emails.csv";
const PROGRESS_EVERY: usize = 10;
/// Room left for the `_N` that `unique_path` appends on collisions.
const COLLISION_SUFFIX_BYTES: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub address: String,
    pub found: usize,
    pub exported: usize,
    pub skipped: usize,
    pub attachments: usize,
    /// Set once at least one message was written.
    pub output_dir: Option<PathBuf>,
    /// Why the address was given up on, if it was.
    pub error: Option<String>,
}

pub struct Extractor<A> {
    api: A,
    output_dir: PathBuf,
    download_attachments: bool,
}

impl<A: MailApi> Extractor<A> {
    pub fn new(api: A, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            output_dir: output_dir.into(),
            download_attachments: false,
        }
    }

    pub fn with_attachments(mut self, enabled: bool) -> Self {
        self.download_attachments = enabled;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Extract every address in order. Auth and quota failures stop the run;
    /// other failures only cost the address (or message) they happened on.
    pub async fn run(&self, addresses: &[String]) -> AppResult<Vec<ExtractionSummary>> {
        let mut summaries = Vec::with_capacity(addresses.len());
        for address in addresses {
            summaries.push(self.extract_address(address).await?);
        }
        Ok(summaries)
    }

    /// Extract one address. A non-fatal failure is recorded in the returned
    /// summary together with whatever was written before it happened.
    pub async fn extract_address(&self, address: &str) -> AppResult<ExtractionSummary> {
        let mut summary = ExtractionSummary {
            address: address.to_string(),
            ..Default::default()
        };
        match self.fill_summary(address, &mut summary).await {
            Ok(()) => Ok(summary),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(address = %address, error = %e, "Extraction failed for address");
                summary.error = Some(e.to_string());
                Ok(summary)
            }
        }
    }

    async fn fill_summary(&self, address: &str, summary: &mut ExtractionSummary) -> AppResult<()> {
        let started = Instant::now();
        let ids = list_all_message_ids(&self.api, &build_query(address)).await?;
        summary.found = ids.len();
        info!(address = %address, found = ids.len(), "Searching for emails");
        if ids.is_empty() {
            return Ok(());
        }

        let email_dir = self.output_dir.join(sanitize_filename(address));
        fs::create_dir_all(&email_dir).map_err(|e| AppError::io(&email_dir, e))?;

        let mut rows = Vec::with_capacity(ids.len());
        for (idx, id) in ids.iter().enumerate() {
            let index = idx + 1;
            match self.export_message(&email_dir, index, id).await {
                Ok(row) => {
                    summary.attachments += row.attachments.len();
                    summary.exported += 1;
                    if summary.output_dir.is_none() {
                        summary.output_dir = Some(email_dir.clone());
                    }
                    rows.push(row);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(message_id = %id, error = %e, "Error processing message; skipping");
                    summary.skipped += 1;
                }
            }
            if index % PROGRESS_EVERY == 0 {
                info!(address = %address, processed = index, total = ids.len(), "Extraction progress");
            }
        }

        if !rows.is_empty() {
            write_csv(&email_dir.join(CSV_FILE), &rows)?;
        }
        info!(
            address = %address,
            exported = summary.exported,
            skipped = summary.skipped,
            elapsed_ms = ?started.elapsed().as_millis(),
            "Address extraction completed"
        );
        Ok(())
    }

    async fn export_message(&self, email_dir: &Path, index: usize, id: &str) -> AppResult<CsvRow> {
        let message = self.api.get_message(id).await?;
        let headers = &message.payload.headers;
        let subject = header(headers, "Subject");
        let from = header(headers, "From");
        let to = header(headers, "To");
        let cc = header(headers, "Cc");
        let date = format_date(header(headers, "Date"));
        let stem = message_stem(index, subject);

        let attachments = if self.download_attachments {
            let message_dir = email_dir.join(&stem);
            let attachments_dir = message_dir.join("attachments");
            fs::create_dir_all(&attachments_dir).map_err(|e| AppError::io(&attachments_dir, e))?;
            let saved = self.save_attachments(&message, &attachments_dir).await?;
            if saved.is_empty() {
                remove_if_empty(&attachments_dir);
                remove_if_empty(&message_dir);
            }
            saved
        } else {
            Vec::new()
        };

        let html_name = format!("{stem}{HTML_EXT}");
        let html_path = email_dir.join(&html_name);
        let page = render_html(
            &HeaderBlock {
                subject,
                from,
                to,
                cc,
                date: &date,
            },
            &html_body(&message.payload),
        );
        fs::write(&html_path, page).map_err(|e| AppError::io(&html_path, e))?;
        debug!(message_id = %id, file = %html_name, "Wrote message");

        Ok(CsvRow {
            filename: html_name,
            subject: subject.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            cc: cc.to_string(),
            date,
            message_id: id.to_string(),
            attachments,
        })
    }

    /// Save every attachment of `message` into `dir` and return the file
    /// names used. One bad attachment is logged and skipped.
    pub async fn save_attachments(&self, message: &Message, dir: &Path) -> AppResult<Vec<String>> {
        let mut saved = Vec::new();
        for attachment in collect_attachments(&message.payload) {
            match self.save_attachment(&message.id, &attachment, dir).await {
                Ok(name) => saved.push(name),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        message_id = %message.id,
                        filename = %attachment.filename,
                        error = %e,
                        "Could not save attachment"
                    );
                }
            }
        }
        Ok(saved)
    }

    async fn save_attachment(
        &self,
        message_id: &str,
        attachment: &AttachmentRef,
        dir: &Path,
    ) -> AppResult<String> {
        let encoded = match &attachment.source {
            AttachmentSource::Remote(attachment_id) => {
                self.api
                    .get_attachment(message_id, attachment_id)
                    .await?
                    .data
            }
            AttachmentSource::Inline(data) => data.clone(),
        };
        let bytes = decode_base64url(&encoded)
            .map_err(|e| AppError::Unexpected(format!("decode attachment data: {e}")))?;

        let name = fit_filename(
            &sanitize_filename(&attachment.filename),
            MAX_NAME_BYTES - COLLISION_SUFFIX_BYTES,
        );
        let path = unique_path(dir, &name);
        fs::write(&path, &bytes).map_err(|e| AppError::io(&path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(message_id = %message_id, file = %name, bytes = bytes.len(), "Saved attachment");
        Ok(name)
    }
}

fn remove_if_empty(dir: &Path) {
    let empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if empty {
        let _ = fs::remove_dir(dir);
    }
}
