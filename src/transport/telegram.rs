//! Telegram Bot API client.
//!
//! Only the two methods the bot needs are wrapped: `sendMessage` and
//! `getUpdates`. The bot token is part of every request URL, so request
//! errors are stripped of their URL before they are logged or returned.

use super::{InboundMessage, ParseMode, SendOutcome, Transport};
use crate::constants::TELEGRAM_API_BASE;
use crate::error::{BarnError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Extra time on top of the long-poll timeout before the HTTP request gives up
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Used when a 429 response carries no retry hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Standard Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Bot API client bound to one bot token
pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_base(TELEGRAM_API_BASE, token)
    }

    /// Build a client against a custom API base URL (a local Bot API server, for instance)
    pub fn with_api_base(api_base: &str, token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(BarnError::configuration("Bot token must not be empty"));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BarnError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", api_base.trim_end_matches('/'), token.trim()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str, parse_mode: ParseMode) -> SendOutcome {
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: match parse_mode {
                ParseMode::Plain => None,
                ParseMode::Html => Some("HTML"),
            },
        };

        let response = match self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let e = e.without_url();
                warn!(chat_id, error = %e, "sendMessage request failed");
                return SendOutcome::Failed(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let outcome = classify_send_response(status, &text);
        debug!(chat_id, status, ?outcome, "sendMessage completed");
        outcome
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<InboundMessage>> {
        let body = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message"],
        };

        let response = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(timeout + POLL_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                BarnError::transport(format!("getUpdates request failed: {}", e.without_url()))
            })?;

        let text = response.text().await.map_err(|e| {
            BarnError::transport(format!("getUpdates body unreadable: {}", e.without_url()))
        })?;

        parse_updates(&text)
    }
}

/// Classify a `sendMessage` HTTP response
pub fn classify_send_response(status: u16, body: &str) -> SendOutcome {
    let parsed: Option<ApiResponse<serde_json::Value>> = serde_json::from_str(body).ok();

    let rate_limited = status == 429
        || parsed
            .as_ref()
            .and_then(|r| r.error_code)
            .is_some_and(|code| code == 429);

    if rate_limited {
        let retry_after = parsed
            .as_ref()
            .and_then(|r| r.parameters.as_ref())
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return SendOutcome::RateLimited(retry_after);
    }

    match parsed {
        Some(response) if response.ok && (200..300).contains(&status) => SendOutcome::Delivered,
        Some(response) => SendOutcome::Failed(
            response
                .description
                .unwrap_or_else(|| format!("HTTP {}", status)),
        ),
        None => SendOutcome::Failed(format!("HTTP {}: unparseable response", status)),
    }
}

/// Decode a `getUpdates` response body
pub fn parse_updates(body: &str) -> Result<Vec<InboundMessage>> {
    let response: ApiResponse<Vec<Update>> = serde_json::from_str(body)
        .map_err(|e| BarnError::transport(format!("Invalid getUpdates response: {}", e)))?;

    if !response.ok {
        return Err(BarnError::transport(format!(
            "getUpdates rejected: {}",
            response
                .description
                .unwrap_or_else(|| "no description".to_string())
        )));
    }

    Ok(response
        .result
        .unwrap_or_default()
        .into_iter()
        .map(|update| InboundMessage {
            update_id: update.update_id,
            chat_id: update.message.as_ref().map(|m| m.chat.id),
            text: update.message.and_then(|m| m.text),
        })
        .collect())
}
