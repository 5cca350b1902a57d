use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::{json, Value};

use gmail_extractor::errors::{AppError, AppResult};
use gmail_extractor::extract::Extractor;
use gmail_extractor::gmail::{
    api_error, build_query, list_all_message_ids, AttachmentData, ListPage, MailApi, Message,
    MessageRef,
};

/// In-memory stand-in for the Gmail API.
#[derive(Default)]
struct FakeApi {
    /// query -> pages of message ids
    listings: HashMap<String, Vec<Vec<String>>>,
    list_failures: HashMap<String, u16>,
    messages: HashMap<String, Message>,
    message_failures: HashMap<String, u16>,
    attachments: HashMap<String, Vec<u8>>,
    page_requests: Mutex<Vec<Option<String>>>,
}

impl FakeApi {
    fn with_messages(address: &str, messages: Vec<Value>) -> Self {
        let mut api = Self::default();
        let mut ids = Vec::new();
        for raw in messages {
            let msg: Message = serde_json::from_value(raw).unwrap();
            ids.push(msg.id.clone());
            api.messages.insert(msg.id.clone(), msg);
        }
        api.listings.insert(build_query(address), vec![ids]);
        api
    }
}

fn failure(status: u16) -> AppError {
    api_error(StatusCode::from_u16(status).unwrap(), "")
}

impl MailApi for FakeApi {
    async fn list_page(&self, query: &str, page_token: Option<&str>) -> AppResult<ListPage> {
        self.page_requests
            .lock()
            .unwrap()
            .push(page_token.map(str::to_string));
        if let Some(status) = self.list_failures.get(query) {
            return Err(failure(*status));
        }
        let pages = self.listings.get(query).cloned().unwrap_or_default();
        let index = page_token
            .and_then(|t| t.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        let ids = pages.get(index).cloned().unwrap_or_default();
        Ok(ListPage {
            result_size_estimate: ids.len() as u32,
            messages: ids
                .into_iter()
                .map(|id| MessageRef { id, thread_id: None })
                .collect(),
            next_page_token: (index + 1 < pages.len()).then(|| format!("page-{}", index + 1)),
        })
    }

    async fn get_message(&self, id: &str) -> AppResult<Message> {
        if let Some(status) = self.message_failures.get(id) {
            return Err(failure(*status));
        }
        self.messages.get(id).cloned().ok_or_else(|| failure(404))
    }

    async fn get_attachment(
        &self,
        _message_id: &str,
        attachment_id: &str,
    ) -> AppResult<AttachmentData> {
        let bytes = self.attachments.get(attachment_id).ok_or_else(|| failure(404))?;
        Ok(AttachmentData {
            size: bytes.len() as u64,
            data: URL_SAFE.encode(bytes),
        })
    }
}

fn b64(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

fn headers(subject: &str, from: &str, to: &str, cc: &str, date: &str) -> Value {
    let mut list = vec![
        json!({"name": "From", "value": from}),
        json!({"name": "To", "value": to}),
        json!({"name": "Date", "value": date}),
    ];
    if !subject.is_empty() {
        list.push(json!({"name": "Subject", "value": subject}));
    }
    if !cc.is_empty() {
        list.push(json!({"name": "Cc", "value": cc}));
    }
    Value::Array(list)
}

fn message_with_parts(id: &str, subject: &str, parts: Value) -> Value {
    json!({
        "id": id,
        "payload": {
            "mimeType": "multipart/mixed",
            "headers": headers(subject, "Jane <jane@example.com>", "bob@example.com", "", "Mon, 2 Jan 2023 15:04:05 +0000"),
            "parts": parts
        }
    })
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn pagination_follows_next_page_token() {
    let mut api = FakeApi::default();
    api.listings.insert(
        "q".into(),
        vec![
            vec!["a".into(), "b".into()],
            vec![],
            vec!["c".into()],
        ],
    );

    let ids = list_all_message_ids(&api, "q").await.unwrap();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(
        *api.page_requests.lock().unwrap(),
        vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
    );
}

#[tokio::test]
async fn address_without_mail_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let extractor = Extractor::new(FakeApi::default(), &out);

    let summary = extractor.extract_address("nobody@example.com").await.unwrap();
    assert_eq!(summary.found, 0);
    assert_eq!(summary.output_dir, None);
    assert!(!out.exists());
}

#[tokio::test]
async fn writes_html_pages_and_csv_index() {
    let address = "jane@example.com";
    let api = FakeApi::with_messages(
        address,
        vec![
            json!({
                "id": "m1",
                "payload": {
                    "mimeType": "multipart/alternative",
                    "headers": headers("Lunch: today?", "Jane <jane@example.com>", "bob@example.com", "carol@example.com", "Tue, 1 Jul 2003 10:52:37 +0200"),
                    "parts": [
                        {"mimeType": "text/plain", "body": {"data": b64(b"plain")}},
                        {"mimeType": "text/html", "body": {"data": b64(b"<p>See you at noon</p>")}}
                    ]
                }
            }),
            json!({
                "id": "m2",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": headers("", "bob@example.com", "jane@example.com", "", "garbage date"),
                    "body": {"data": b64(b"1 < 2")}
                }
            }),
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(api, dir.path());

    let summary = extractor.extract_address(address).await.unwrap();
    assert_eq!(summary.found, 2);
    assert_eq!(summary.exported, 2);
    assert_eq!(summary.skipped, 0);

    let email_dir = dir.path().join(address);
    assert_eq!(summary.output_dir.as_deref(), Some(email_dir.as_path()));
    assert_eq!(
        list_dir(&email_dir),
        vec!["0001_Lunch_ today_.html", "0002_no_subject.html", "emails.csv"]
    );

    let first = fs::read_to_string(email_dir.join("0001_Lunch_ today_.html")).unwrap();
    assert!(first.contains("<title>Lunch: today?</title>"));
    assert!(first.contains("<p>See you at noon</p>"));
    assert!(first.contains("<p><strong>Cc:</strong> carol@example.com</p>"));
    assert!(first.contains("2003-07-01 10:52:37"));

    let second = fs::read_to_string(email_dir.join("0002_no_subject.html")).unwrap();
    assert!(second.contains("<pre>1 &lt; 2</pre>"));
    assert!(!second.contains("Cc:</strong>"));

    let csv = fs::read_to_string(email_dir.join("emails.csv")).unwrap();
    let lines: Vec<&str> = csv.split("\r\n").collect();
    assert_eq!(lines[0], "Filename,Subject,From,To,Cc,Date,Message ID,Attachments");
    assert_eq!(
        lines[1],
        "0001_Lunch_ today_.html,Lunch: today?,Jane <jane@example.com>,bob@example.com,carol@example.com,2003-07-01 10:52:37,m1,"
    );
    assert_eq!(
        lines[2],
        "0002_no_subject.html,,bob@example.com,jane@example.com,,garbage date,m2,"
    );
    assert_eq!(lines[3], "");
}

#[tokio::test]
async fn attachments_land_next_to_the_message() {
    let address = "jane@example.com";
    let mut api = FakeApi::with_messages(
        address,
        vec![
            message_with_parts(
                "m1",
                "Docs",
                json!([
                    {"mimeType": "text/plain", "body": {"data": b64(b"see attached")}},
                    {"mimeType": "application/pdf", "filename": "document.pdf",
                     "body": {"attachmentId": "att-1", "size": 5}},
                    {"mimeType": "application/pdf", "filename": "document.pdf",
                     "body": {"data": b64(b"second")}},
                    {"mimeType": "multipart/related", "parts": [
                        {"mimeType": "multipart/alternative", "parts": [
                            {"mimeType": "text/plain", "filename": "re:port?.txt",
                             "body": {"data": b64(b"nested")}}
                        ]}
                    ]}
                ]),
            ),
            message_with_parts(
                "m2",
                "No files",
                json!([{"mimeType": "text/plain", "body": {"data": b64(b"hello")}}]),
            ),
        ],
    );
    api.attachments.insert("att-1".into(), b"first".to_vec());
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(api, dir.path()).with_attachments(true);

    let summary = extractor.extract_address(address).await.unwrap();
    assert_eq!(summary.attachments, 3);

    let email_dir = dir.path().join(address);
    let attachments_dir = email_dir.join("0001_Docs").join("attachments");
    assert_eq!(
        list_dir(&attachments_dir),
        vec!["document.pdf", "document_1.pdf", "re_port_.txt"]
    );
    assert_eq!(fs::read(attachments_dir.join("document.pdf")).unwrap(), b"first");
    assert_eq!(fs::read(attachments_dir.join("document_1.pdf")).unwrap(), b"second");
    assert_eq!(fs::read(attachments_dir.join("re_port_.txt")).unwrap(), b"nested");

    // Empty attachment folders are cleaned up again.
    assert!(!email_dir.join("0002_No files").exists());

    let csv = fs::read_to_string(email_dir.join("emails.csv")).unwrap();
    assert!(csv.contains(",m1,\"document.pdf, document_1.pdf, re_port_.txt\"\r\n"));
    assert!(csv.contains(",m2,\r\n"));
}

#[tokio::test]
async fn save_attachments_handles_remote_inline_and_missing() {
    let mut api = FakeApi::default();
    api.attachments.insert("att-ok".into(), b"Test file content".to_vec());
    let extractor = Extractor::new(api, "unused");
    let message: Message = serde_json::from_value(message_with_parts(
        "m1",
        "x",
        json!([
            {"filename": "test.pdf", "body": {"attachmentId": "att-ok"}},
            {"filename": "gone.pdf", "body": {"attachmentId": "att-missing"}},
            {"filename": "image.png", "body": {"data": b64(b"Inline image content")}},
            {"filename": "broken.bin", "body": {"data": "***"}},
            {"mimeType": "text/plain", "body": {"data": "SGVsbG8gV29ybGQ="}}
        ]),
    ))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let saved = extractor.save_attachments(&message, dir.path()).await.unwrap();
    assert_eq!(saved, vec!["test.pdf", "image.png"]);
    assert_eq!(fs::read(dir.path().join("test.pdf")).unwrap(), b"Test file content");
    assert_eq!(fs::read(dir.path().join("image.png")).unwrap(), b"Inline image content");
    assert_eq!(list_dir(dir.path()), vec!["image.png", "test.pdf"]);
}

#[tokio::test]
async fn message_without_attachments_saves_nothing() {
    let extractor = Extractor::new(FakeApi::default(), "unused");
    let message: Message = serde_json::from_value(message_with_parts(
        "m1",
        "x",
        json!([{"mimeType": "text/plain", "body": {"data": "SGVsbG8gV29ybGQ="}}]),
    ))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let saved = extractor.save_attachments(&message, dir.path()).await.unwrap();
    assert!(saved.is_empty());
    assert!(list_dir(dir.path()).is_empty());
}

#[tokio::test]
async fn unfetchable_message_is_skipped() {
    let address = "jane@example.com";
    let mut api = FakeApi::with_messages(
        address,
        vec![message_with_parts("m2", "kept", json!([]))],
    );
    api.listings
        .insert(build_query(address), vec![vec!["m1".into(), "m2".into()]]);
    api.message_failures.insert("m1".into(), 404);
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(api, dir.path());

    let summary = extractor.extract_address(address).await.unwrap();
    assert_eq!(summary.found, 2);
    assert_eq!(summary.exported, 1);
    assert_eq!(summary.skipped, 1);
    // Numbering follows the listing, so the survivor keeps index 2.
    assert!(dir.path().join(address).join("0002_kept.html").exists());
}

#[tokio::test]
async fn rate_limit_aborts_the_run() {
    let address = "jane@example.com";
    let mut api = FakeApi::with_messages(
        address,
        vec![message_with_parts("m1", "one", json!([]))],
    );
    api.message_failures.insert("m1".into(), 429);
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(api, dir.path());

    let err = extractor
        .run(&[address.to_string(), "other@example.com".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RateLimited(_)));
    assert_eq!(extractor.api().page_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn revoked_token_aborts_the_run() {
    let mut api = FakeApi::default();
    api.list_failures.insert(build_query("a@example.com"), 401);
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(api, dir.path());

    let err = extractor.run(&["a@example.com".to_string()]).await.unwrap_err();
    assert!(matches!(err, AppError::AuthExpired));
}

#[tokio::test]
async fn listing_failure_moves_on_to_next_address() {
    let good = "good@example.com";
    let mut api = FakeApi::with_messages(good, vec![message_with_parts("m1", "hi", json!([]))]);
    api.list_failures.insert(build_query("bad@example.com"), 500);
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(api, dir.path());

    let summaries = extractor
        .run(&["bad@example.com".to_string(), good.to_string()])
        .await
        .unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries[0].error.is_some());
    assert_eq!(summaries[1].exported, 1);
    assert!(dir.path().join(good).join("emails.csv").exists());
}

#[tokio::test]
async fn wide_subject_and_attachment_names_fit_the_filesystem() {
    let address = "jane@example.com";
    let long_subject = "日".repeat(100);
    let long_file = format!("{}.pdf", "報".repeat(100));
    let api = FakeApi::with_messages(
        address,
        vec![
            message_with_parts("m1", "ok", json!([])),
            message_with_parts(
                "m2",
                &long_subject,
                json!([{"mimeType": "application/pdf", "filename": long_file,
                        "body": {"data": b64(b"pdf")}}]),
            ),
            message_with_parts("m3", "after", json!([])),
        ],
    );
    let dir = tempfile::tempdir().unwrap();
    let extractor = Extractor::new(api, dir.path()).with_attachments(true);

    let summaries = extractor.run(&[address.to_string()]).await.unwrap();
    let summary = &summaries[0];
    assert_eq!(summary.error, None);
    assert_eq!((summary.found, summary.exported, summary.skipped), (3, 3, 0));
    assert_eq!(summary.attachments, 1);

    let email_dir = dir.path().join(address);
    let files = list_dir(&email_dir);
    assert!(files.contains(&"0003_after.html".to_string()), "{files:?}");
    assert!(files.contains(&"emails.csv".to_string()));
    let wide_page = files
        .iter()
        .find(|f| f.starts_with("0002_日") && f.ends_with(".html"))
        .unwrap();
    assert!(wide_page.len() <= 255);

    let stem = wide_page.trim_end_matches(".html");
    let saved = list_dir(&email_dir.join(stem).join("attachments"));
    assert_eq!(saved.len(), 1);
    assert!(saved[0].ends_with("報.pdf") && saved[0].len() <= 255, "{saved:?}");
}

#[tokio::test]
async fn failed_index_write_keeps_partial_summary() {
    let address = "jane@example.com";
    let api = FakeApi::with_messages(address, vec![message_with_parts("m1", "one", json!([]))]);
    let dir = tempfile::tempdir().unwrap();
    let email_dir = dir.path().join(address);
    // A directory where the CSV index should go makes the write fail.
    fs::create_dir_all(email_dir.join("emails.csv")).unwrap();
    let extractor = Extractor::new(api, dir.path());

    let summaries = extractor.run(&[address.to_string()]).await.unwrap();
    let summary = &summaries[0];
    assert!(summary.error.as_deref().unwrap().contains("emails.csv"));
    assert_eq!((summary.found, summary.exported), (1, 1));
    assert_eq!(summary.output_dir.as_deref(), Some(email_dir.as_path()));
    assert!(email_dir.join("0001_one.html").exists());
}
