//! Gmail REST client and the pagination built on top of it.
mod types;

pub use types::{AttachmentData, Header, ListPage, Message, MessagePart, MessageRef, PartBody, Profile};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use types::ErrorEnvelope;

pub const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Search expression matching an address as sender, recipient or cc.
pub fn build_query(email_address: &str) -> String {
    format!("from:{email_address} OR to:{email_address} OR cc:{email_address}")
}

/// The calls the extractor needs from the provider.
#[allow(async_fn_in_trait)]
pub trait MailApi {
    async fn list_page(&self, query: &str, page_token: Option<&str>) -> AppResult<ListPage>;
    async fn get_message(&self, id: &str) -> AppResult<Message>;
    async fn get_attachment(&self, message_id: &str, attachment_id: &str)
        -> AppResult<AttachmentData>;
}

/// Follow `nextPageToken` until the listing is exhausted.
pub async fn list_all_message_ids<A: MailApi>(api: &A, query: &str) -> AppResult<Vec<String>> {
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = api.list_page(query, page_token.as_deref()).await?;
        pages += 1;
        ids.extend(page.messages.into_iter().map(|m| m.id));
        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    debug!(query = %query, pages, found = ids.len(), "Listed messages");
    Ok(ids)
}

pub struct GmailClient {
    http: reqwest::Client,
    base: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base(API_BASE, access_token)
    }

    pub fn with_base(base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub async fn get_profile(&self) -> AppResult<Profile> {
        self.get_json("profile", &[]).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> AppResult<T> {
        let url = format!("{}/{}", self.base, path);
        let res = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("request to {path} failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let err = api_error(status, &body);
            warn!(path = %path, status = status.as_u16(), error = %err, "Gmail API call failed");
            return Err(err);
        }

        res.json()
            .await
            .map_err(|e| AppError::Unexpected(format!("parse {path} response: {e}")))
    }
}

impl MailApi for GmailClient {
    async fn list_page(&self, query: &str, page_token: Option<&str>) -> AppResult<ListPage> {
        let mut params = vec![("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.get_json("messages", &params).await
    }

    async fn get_message(&self, id: &str) -> AppResult<Message> {
        self.get_json(&format!("messages/{id}"), &[("format", "full")])
            .await
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> AppResult<AttachmentData> {
        self.get_json(
            &format!("messages/{message_id}/attachments/{attachment_id}"),
            &[],
        )
        .await
    }
}

/// Map a failed Gmail response onto our error kinds. 401 means the token is
/// no longer accepted; 429 and the 403 rate-limit reasons mean quota.
pub fn api_error(status: StatusCode, body: &str) -> AppError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|env| env.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
    let rate_limited_reason = parsed.as_ref().is_some_and(|env| {
        env.error
            .errors
            .iter()
            .any(|d| d.reason == "rateLimitExceeded" || d.reason == "userRateLimitExceeded")
    });

    match status {
        StatusCode::UNAUTHORIZED => AppError::AuthExpired,
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(message),
        StatusCode::FORBIDDEN if rate_limited_reason => AppError::RateLimited(message),
        _ => AppError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
