// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gmail REST API.
//!
//! Provides [`GmailClient`], the `MailboxProvider` adapter used in
//! production: lists message ids received after the poll floor, fetches
//! each message in full, decodes the MIME tree into a [`RawMessage`], and
//! leaves classification to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use mailbridge_core::BridgeError;
use mailbridge_core::traits::{MailboxProvider, TokenSource};
use mailbridge_core::types::{AttachmentPart, RawMessage};

/// Gmail API adapter behind the mailbox seam.
///
/// Access tokens come from the injected [`TokenSource`]; the base URL is
/// injectable so tests can point it at a mock server.
pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl GmailClient {
    /// Creates a Gmail API client against the given base URL
    /// (`https://gmail.googleapis.com` in production).
    pub fn new(api_base: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BridgeError::Mailbox {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: api_base.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, BridgeError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| BridgeError::Mailbox {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Mailbox {
                message: format!("Gmail API returned {status}: {body}"),
                source: None,
            });
        }

        let body = response.text().await.map_err(|e| BridgeError::Mailbox {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        serde_json::from_str(&body).map_err(|e| BridgeError::Mailbox {
            message: format!("failed to parse Gmail response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    async fn fetch_detail(&self, token: &str, id: &str) -> Result<MessageDetail, BridgeError> {
        let url = format!("{}/gmail/v1/users/me/messages/{id}", self.base_url);
        self.get_json(token, &url, &[("format", "full".to_string())])
            .await
    }
}

#[async_trait]
impl MailboxProvider for GmailClient {
    async fn fetch_since(
        &self,
        user_id: &str,
        floor: DateTime<Utc>,
        max_messages: usize,
    ) -> Result<Vec<RawMessage>, BridgeError> {
        let token = self.tokens.access_token(user_id).await?;

        // `after:` is second-granular and inclusive; the strict floor
        // comparison below drops the overlap. Gmail lists newest first, so
        // the whole window must be paged before the oldest ids are known.
        let url = format!("{}/gmail/v1/users/me/messages", self.base_url);
        let mut refs: Vec<MessageRef> = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("q", format!("after:{}", floor.timestamp())),
                ("maxResults", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(page) = page_token.as_deref() {
                query.push(("pageToken", page.to_string()));
            }
            let list: ListResponse = self.get_json(&token, &url, &query).await?;
            let page_empty = list.messages.is_empty();
            refs.extend(list.messages);
            page_token = list.next_page_token;
            if page_token.is_none() || page_empty {
                break;
            }
        }
        debug!(user_id, listed = refs.len(), "gmail list fetched");

        // Newest first means the oldest `max_messages` ids sit at the tail;
        // only those need a detail fetch.
        let tail_start = refs.len().saturating_sub(max_messages);
        let mut batch = Vec::new();
        for msg_ref in &refs[tail_start..] {
            let detail = self.fetch_detail(&token, &msg_ref.id).await?;
            match into_raw(detail) {
                Ok(raw) if raw.received_at > floor => batch.push(raw),
                Ok(_) => {}
                Err(e) => {
                    // An undecodable message still enters the batch so it
                    // lands as an error row rather than being lost once the
                    // high-water mark moves past it.
                    warn!(user_id, message_id = %msg_ref.id, error = %e, "undecodable message, ingesting as error");
                    batch.push(undecodable_placeholder(&msg_ref.id, floor, &e));
                }
            }
        }
        batch.sort_by_key(|m| m.received_at);
        batch.truncate(max_messages);
        Ok(batch)
    }
}

/// Page size for the id listing; detail fetches are bounded separately by
/// `max_messages`.
const LIST_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    id: String,
    thread_id: Option<String>,
    snippet: Option<String>,
    internal_date: Option<String>,
    payload: Option<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

fn into_raw(detail: MessageDetail) -> Result<RawMessage, BridgeError> {
    let received_at = detail
        .internal_date
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))
        .ok_or_else(|| BridgeError::Mailbox {
            message: format!("message {} has no usable internalDate", detail.id),
            source: None,
        })?;

    let (subject, sender, body_text, attachments) = match &detail.payload {
        Some(payload) => {
            let mut attachments = Vec::new();
            collect_attachments(payload, &mut attachments);
            (
                header_value(payload, "Subject"),
                header_value(payload, "From"),
                extract_body(payload).unwrap_or_default(),
                attachments,
            )
        }
        None => (None, None, String::new(), Vec::new()),
    };

    Ok(RawMessage {
        message_id: detail.id,
        thread_id: detail.thread_id,
        subject,
        sender,
        snippet: detail.snippet,
        body_text,
        attachments,
        received_at,
        decode_error: None,
    })
}

/// Stand-in for a message that was fetched but could not be decoded.
///
/// Pinned to the window floor so it sorts before every real message and
/// never drags the poll high-water mark forward on its own.
fn undecodable_placeholder(id: &str, floor: DateTime<Utc>, err: &BridgeError) -> RawMessage {
    RawMessage {
        message_id: id.to_string(),
        thread_id: None,
        subject: None,
        sender: None,
        snippet: None,
        body_text: String::new(),
        attachments: Vec::new(),
        received_at: floor,
        decode_error: Some(err.to_string()),
    }
}

fn header_value(payload: &Part, name: &str) -> Option<String> {
    payload
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// Decode the message body, preferring `text/plain` over `text/html` and
/// recursing through `multipart/*` containers.
fn extract_body(payload: &Part) -> Option<String> {
    find_text(payload, "text/plain").or_else(|| find_text(payload, "text/html"))
}

fn find_text(part: &Part, wanted: &str) -> Option<String> {
    let mime = part.mime_type.as_deref().unwrap_or("");
    if mime.eq_ignore_ascii_case(wanted)
        && let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref())
    {
        return decode_body(data);
    }
    part.parts.iter().find_map(|p| find_text(p, wanted))
}

/// Gmail body data is base64url, with or without padding.
fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Walk the MIME tree collecting named attachments and inline image parts.
fn collect_attachments(part: &Part, out: &mut Vec<AttachmentPart>) {
    let filename = part.filename.as_deref().unwrap_or("");
    let mime = part.mime_type.as_deref().unwrap_or("");
    if !filename.is_empty() || mime.starts_with("image/") {
        out.push(AttachmentPart {
            filename: filename.to_string(),
            mime_type: if mime.is_empty() {
                "application/octet-stream".to_string()
            } else {
                mime.to_string()
            },
        });
    }
    for child in &part.parts {
        collect_attachments(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn access_token(&self, _user_id: &str) -> Result<String, BridgeError> {
            Ok("test-token".to_string())
        }
    }

    fn client(base: &str) -> GmailClient {
        GmailClient::new(base, Arc::new(StaticToken)).unwrap()
    }

    fn b64(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text)
    }

    fn detail_body(id: &str, internal_date_ms: i64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "threadId": format!("thread-{id}"),
            "snippet": "Please find attached",
            "internalDate": internal_date_ms.to_string(),
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "Subject", "value": format!("Invoice {id}")},
                    {"name": "From", "value": "Billing <billing@example.com>"}
                ],
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {
                                "mimeType": "text/html",
                                "body": {"data": b64("<p>ignored when plain exists</p>")}
                            },
                            {
                                "mimeType": "text/plain",
                                "body": {"data": b64("See https://example.com/pay")}
                            }
                        ]
                    },
                    {
                        "mimeType": "application/pdf",
                        "filename": "invoice.pdf",
                        "body": {}
                    },
                    {
                        "mimeType": "image/png",
                        "filename": "",
                        "body": {}
                    }
                ]
            }
        })
    }

    async fn mount_detail(server: &MockServer, id: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/gmail/v1/users/me/messages/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_decodes_mime_tree() {
        let server = MockServer::start().await;
        let floor = DateTime::<Utc>::from_timestamp(1_770_000_000, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("q", "after:1770000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "m1", "threadId": "thread-m1"}]
            })))
            .mount(&server)
            .await;
        mount_detail(&server, "m1", detail_body("m1", 1_770_000_500_000)).await;

        let batch = client(&server.uri())
            .fetch_since("u1", floor, 25)
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);

        let msg = &batch[0];
        assert_eq!(msg.message_id, "m1");
        assert_eq!(msg.thread_id.as_deref(), Some("thread-m1"));
        assert_eq!(msg.subject.as_deref(), Some("Invoice m1"));
        assert_eq!(msg.sender.as_deref(), Some("Billing <billing@example.com>"));
        // text/plain preferred over text/html.
        assert_eq!(msg.body_text, "See https://example.com/pay");
        assert_eq!(msg.attachments.len(), 2);
        assert_eq!(msg.attachments[0].filename, "invoice.pdf");
        assert_eq!(msg.attachments[1].mime_type, "image/png");
        assert_eq!(msg.received_at.timestamp(), 1_770_000_500);
    }

    #[tokio::test]
    async fn fetch_filters_floor_and_sorts_oldest_first() {
        let server = MockServer::start().await;
        let floor = DateTime::<Utc>::from_timestamp(1_770_000_000, 0).unwrap();

        // Gmail lists newest first; the adapter must flip the order and
        // drop the message sitting at the inclusive edge of `after:`.
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "newest"}, {"id": "older"}, {"id": "edge"}]
            })))
            .mount(&server)
            .await;
        mount_detail(&server, "newest", detail_body("newest", 1_770_000_900_000)).await;
        mount_detail(&server, "older", detail_body("older", 1_770_000_100_000)).await;
        mount_detail(&server, "edge", detail_body("edge", 1_770_000_000_000)).await;

        let batch = client(&server.uri())
            .fetch_since("u1", floor, 25)
            .await
            .unwrap();
        let ids: Vec<_> = batch.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newest"]);
    }

    #[tokio::test]
    async fn empty_mailbox_returns_empty_batch() {
        let server = MockServer::start().await;
        // Gmail omits "messages" entirely when nothing matches.
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"resultSizeEstimate": 0})),
            )
            .mount(&server)
            .await;

        let batch = client(&server.uri())
            .fetch_since("u1", Utc::now(), 25)
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn api_error_is_a_mailbox_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"code": 401, "message": "Invalid Credentials"}
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .fetch_since("u1", Utc::now(), 25)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Mailbox { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn undecodable_message_is_kept_as_error_marker() {
        let server = MockServer::start().await;
        let floor = DateTime::<Utc>::from_timestamp(1_770_000_000, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "good"}, {"id": "broken"}]
            })))
            .mount(&server)
            .await;
        mount_detail(&server, "good", detail_body("good", 1_770_000_500_000)).await;
        // No internalDate: not decodable, but must not vanish either.
        mount_detail(
            &server,
            "broken",
            serde_json::json!({"id": "broken", "threadId": "t"}),
        )
        .await;

        let batch = client(&server.uri())
            .fetch_since("u1", floor, 25)
            .await
            .unwrap();
        let ids: Vec<_> = batch.iter().map(|m| m.message_id.as_str()).collect();
        // The marker is pinned to the floor, so it sorts ahead of real mail.
        assert_eq!(ids, vec!["broken", "good"]);
        assert_eq!(batch[0].received_at, floor);
        assert!(
            batch[0]
                .decode_error
                .as_deref()
                .unwrap()
                .contains("internalDate")
        );
        assert!(batch[1].decode_error.is_none());
    }

    #[tokio::test]
    async fn window_is_paged_and_truncated_to_the_oldest() {
        let server = MockServer::start().await;
        let floor = DateTime::<Utc>::from_timestamp(1_770_000_000, 0).unwrap();

        // Gmail pages newest first; the oldest message only appears on the
        // second page, yet a two-message batch must start with it.
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "newest"}, {"id": "middle"}],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "oldest"}]
            })))
            .mount(&server)
            .await;
        mount_detail(&server, "newest", detail_body("newest", 1_770_000_900_000)).await;
        mount_detail(&server, "middle", detail_body("middle", 1_770_000_500_000)).await;
        mount_detail(&server, "oldest", detail_body("oldest", 1_770_000_100_000)).await;

        let batch = client(&server.uri())
            .fetch_since("u1", floor, 2)
            .await
            .unwrap();
        let ids: Vec<_> = batch.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["oldest", "middle"]);
    }
}
