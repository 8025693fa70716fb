// src/notifier.rs

use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("webhook rejected message ({status}): {body}")]
    ApiError { status: u16, body: String },
}

/// A named notification destination. For Slack this is an incoming webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub webhook_url: String,
}

impl Channel {
    pub fn new(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
        }
    }
}

pub trait Notifier {
    fn notify(&self, channel: &Channel, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

pub struct SlackNotifier {
    client: Client,
}

impl SlackNotifier {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Notifier for SlackNotifier {
    fn notify(&self, channel: &Channel, subject: &str, body: &str) -> Result<(), NotifyError> {
        let text = format!("{subject}\n{body}");

        let resp = self
            .client
            .post(&channel.webhook_url)
            .json(&SlackPayload { text: &text })
            .send()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::ApiError { status, body });
        }

        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them (dry runs).
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, channel: &Channel, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(channel = %channel.name, subject = subject, body = body, "dry-run notification");
        Ok(())
    }
}
