//! HTTP client for a Bot-API-compatible gateway running in user mode.
//!
//! Every call is `POST {base_url}/bot{token}/{method}` with a JSON body, and
//! every reply uses the Bot API envelope:
//! `{"ok": true, "result": ...}` or
//! `{"ok": false, "error_code": 429, "description": "...", "parameters": {"retry_after": 5}}`.
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::TelegramApi;
use crate::error::RemoteError;
use crate::model::{Chat, ChatKind, Message};

static RETRY_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry after (\d+)").expect("valid retry-after pattern"));

/// Wait applied when a 429 carries no explicit duration.
const FALLBACK_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    pub fn new(base_url: &str, token: String) -> Result<Self, RemoteError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Endpoint(format!("invalid gateway URL: {e}")))?;
        // Url::join drops the last path segment unless it ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent("tg-sweeper/0.1")
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn build_request(&self, method: &str, body: &Value) -> Result<reqwest::Request, RemoteError> {
        let endpoint = self
            .base_url
            .join(&format!("bot{}/{}", self.token, method))
            .map_err(|e| RemoteError::Endpoint(format!("invalid gateway endpoint: {e}")))?;
        Ok(self
            .http
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(body)
            .build()?)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, RemoteError> {
        let request = self.build_request(method, &body)?;
        debug!(method, payload = %body, "sending gateway request");
        let res = self.http.execute(request).await?;
        let status = res.status();
        let text = res.text().await?;
        let result = interpret_response(status, &text)?;
        serde_json::from_value(result)
            .map_err(|e| RemoteError::Protocol(format!("{method}: unexpected result shape: {e}")))
    }
}

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Map an HTTP status and body onto the envelope's `result` or a [`RemoteError`].
pub fn interpret_response(status: StatusCode, body: &str) -> Result<Value, RemoteError> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(RemoteError::RateLimited(
                    retry_after_from_text(body).unwrap_or(FALLBACK_RATE_LIMIT_WAIT),
                ));
            }
            if status.is_server_error() {
                return Err(RemoteError::Transient(format!("gateway returned {status}")));
            }
            return Err(RemoteError::Protocol(format!(
                "non-envelope body ({status}): {err}"
            )));
        }
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| RemoteError::Protocol("ok response without result".into()));
    }

    let description = envelope.description.unwrap_or_default();
    let retry_after = envelope
        .parameters
        .and_then(|p| p.retry_after)
        .map(Duration::from_secs);

    match (envelope.error_code, retry_after) {
        (Some(429), wait) => Err(RemoteError::RateLimited(
            wait.or_else(|| retry_after_from_text(&description))
                .unwrap_or(FALLBACK_RATE_LIMIT_WAIT),
        )),
        (Some(_), Some(wait)) => Err(RemoteError::RateLimited(wait)),
        (Some(code), None) if code >= 500 => {
            Err(RemoteError::Transient(format!("{code}: {description}")))
        }
        (Some(code), None) => Err(RemoteError::Rejected { code, description }),
        (None, _) => Err(RemoteError::Protocol(format!(
            "error response without error_code: {description}"
        ))),
    }
}

fn retry_after_from_text(text: &str) -> Option<Duration> {
    RETRY_AFTER
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[derive(Deserialize)]
struct WireChat {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
}

impl From<WireChat> for Chat {
    fn from(w: WireChat) -> Self {
        let title = w
            .title
            .or(w.username)
            .or(w.first_name)
            .unwrap_or_else(|| w.id.to_string());
        Chat {
            id: w.id,
            title,
            kind: ChatKind::from(w.kind.as_str()),
        }
    }
}

#[derive(Deserialize)]
struct WireMessage {
    message_id: i32,
    date: i64,
    #[serde(default)]
    caption: Option<String>,
}

impl TryFrom<WireMessage> for Message {
    type Error = RemoteError;

    fn try_from(w: WireMessage) -> Result<Self, Self::Error> {
        let timestamp = Utc.timestamp_opt(w.date, 0).single().ok_or_else(|| {
            RemoteError::Protocol(format!("message {} has invalid date {}", w.message_id, w.date))
        })?;
        Ok(Message {
            id: w.message_id,
            timestamp,
            caption: w.caption,
        })
    }
}

#[async_trait]
impl TelegramApi for GatewayClient {
    async fn list_chats(&self) -> Result<Vec<Chat>, RemoteError> {
        let chats: Vec<WireChat> = self.call("getChats", json!({})).await?;
        Ok(chats.into_iter().map(Chat::from).collect())
    }

    async fn search_own_messages(
        &self,
        chat_id: i64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Message>, RemoteError> {
        let body = json!({
            "chat_id": chat_id,
            "from": "me",
            "offset": offset,
            "limit": limit,
        });
        let messages: Vec<WireMessage> = self.call("searchChatMessages", body).await?;
        messages.into_iter().map(Message::try_from).collect()
    }

    async fn delete_messages(&self, chat_id: i64, ids: &[i32]) -> Result<(), RemoteError> {
        let body = json!({ "chat_id": chat_id, "message_ids": ids });
        let _: Value = self.call("deleteMessages", body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_yields_result() {
        let value = interpret_response(StatusCode::OK, r#"{"ok":true,"result":[1,2]}"#).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn flood_wait_uses_retry_after_parameter() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":5}}"#;
        let err = interpret_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err, RemoteError::RateLimited(Duration::from_secs(5)));
    }

    #[test]
    fn flood_wait_falls_back_to_description() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 12"}"#;
        let err = interpret_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err, RemoteError::RateLimited(Duration::from_secs(12)));
    }

    #[test]
    fn retry_hint_in_text_only_counts_for_429() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: retry after 30 is not a valid id"}"#;
        assert!(matches!(
            interpret_response(StatusCode::BAD_REQUEST, body),
            Err(RemoteError::Rejected { code: 400, .. })
        ));

        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request","parameters":{"retry_after":3}}"#;
        let err = interpret_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert_eq!(err, RemoteError::RateLimited(Duration::from_secs(3)));

        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests"}"#;
        let err = interpret_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err, RemoteError::RateLimited(FALLBACK_RATE_LIMIT_WAIT));
    }

    #[test]
    fn bad_gateway_url_is_an_endpoint_error() {
        let err = GatewayClient::new("not a url", "tok".into()).unwrap_err();
        assert!(matches!(err, RemoteError::Endpoint(_)));
    }

    #[test]
    fn client_and_server_errors_are_distinguished() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: MESSAGE_DELETE_FORBIDDEN"}"#;
        assert!(matches!(
            interpret_response(StatusCode::BAD_REQUEST, body),
            Err(RemoteError::Rejected { code: 400, .. })
        ));

        let body = r#"{"ok":false,"error_code":502,"description":"Bad Gateway"}"#;
        assert!(matches!(
            interpret_response(StatusCode::BAD_GATEWAY, body),
            Err(RemoteError::Transient(_))
        ));
        assert!(matches!(
            interpret_response(StatusCode::SERVICE_UNAVAILABLE, "<html>down</html>"),
            Err(RemoteError::Transient(_))
        ));
    }

    #[test]
    fn malformed_bodies_are_protocol_errors() {
        assert!(matches!(
            interpret_response(StatusCode::OK, "not json"),
            Err(RemoteError::Protocol(_))
        ));
        assert!(matches!(
            interpret_response(StatusCode::OK, r#"{"ok":true}"#),
            Err(RemoteError::Protocol(_))
        ));
        assert!(matches!(
            interpret_response(StatusCode::OK, r#"{"ok":false,"description":"?"}"#),
            Err(RemoteError::Protocol(_))
        ));
    }

    #[test]
    fn build_request_targets_method_endpoint() {
        let client = GatewayClient::new("http://127.0.0.1:8081/api", "tok".into()).unwrap();
        let request = client
            .build_request("deleteMessages", &json!({ "chat_id": 1, "message_ids": [1, 2] }))
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/api/bottok/deleteMessages");
        assert_eq!(
            request
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }

    #[test]
    fn wire_types_convert() {
        let chat: WireChat = serde_json::from_value(
            json!({ "id": -100, "type": "supergroup", "title": "Rustaceans" }),
        )
        .unwrap();
        let chat = Chat::from(chat);
        assert_eq!(chat.kind, ChatKind::Supergroup);
        assert_eq!(chat.title, "Rustaceans");

        let msg: WireMessage =
            serde_json::from_value(json!({ "message_id": 42, "date": 1_700_000_000, "caption": "#memes" }))
                .unwrap();
        let msg = Message::try_from(msg).unwrap();
        assert_eq!(msg.id, 42);
        assert_eq!(msg.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(msg.caption.as_deref(), Some("#memes"));
    }
}
