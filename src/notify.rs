//! Pushover message delivery.
//!
//! # API
//!
//! `POST /1/messages.json` with form fields `token`, `user` and `message`.
//! The API answers `{"status": 1, "request": "..."}` on success and
//! `{"status": 0, "errors": [...]}` when it rejects the message.

use crate::config::Settings;
use crate::error::{NotifyError, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

pub const MAX_MESSAGE_CHARS: usize = 1024;

/// Acknowledgement of a delivered message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    pub request_id: Option<String>,
}

/// Capability: deliver one message to one recipient.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, app_token: &str, recipient: &str, body: &str) -> Result<Receipt>;
}

/// Pushover API client.
pub struct PushoverClient {
    http: reqwest::Client,
    endpoint: String,
}

impl PushoverClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| NotifyError::Delivery(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: settings.pushover_endpoint.clone(),
        })
    }
}

impl Notifier for PushoverClient {
    async fn send(&self, app_token: &str, recipient: &str, body: &str) -> Result<Receipt> {
        validate_message(app_token, recipient, body)?;

        let url = format!("{}/1/messages.json", self.endpoint);
        debug!(chars = body.chars().count(), "sending pushover message");

        let params = [("token", app_token), ("user", recipient), ("message", body)];
        let response = self
            .http
            .post(url)
            .form(&params)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NotifyError::Delivery(format!("failed to read response body: {}", e)))?;
        interpret_response(status, &text)
    }
}

/// Checks the Pushover client library performs before calling the API.
fn validate_message(app_token: &str, recipient: &str, body: &str) -> Result<()> {
    if app_token.is_empty() {
        return Err(NotifyError::Delivery("empty API token".to_string()));
    }
    if recipient.is_empty() {
        return Err(NotifyError::Delivery("empty recipient key".to_string()));
    }
    if body.is_empty() {
        return Err(NotifyError::Delivery("message is empty".to_string()));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(NotifyError::Delivery(format!(
            "message exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
struct MessageResponse {
    status: i64,
    #[serde(default)]
    request: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

fn interpret_response(status: StatusCode, body: &str) -> Result<Receipt> {
    let parsed = serde_json::from_str::<MessageResponse>(body);

    match parsed {
        Ok(response) if status.is_success() && response.status == 1 => Ok(Receipt {
            request_id: response.request,
        }),
        Ok(response) if !response.errors.is_empty() => Err(NotifyError::Delivery(format!(
            "{} ({})",
            response.errors.join("; "),
            status
        ))),
        Ok(_) => Err(NotifyError::Delivery(format!(
            "pushover rejected the message ({})",
            status
        ))),
        Err(_) => Err(NotifyError::Delivery(format!(
            "unexpected response ({}): {}",
            status,
            body.trim()
        ))),
    }
}
