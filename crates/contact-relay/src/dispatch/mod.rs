//! Notification dispatch
//!
//! One call to [`Dispatcher::dispatch`] makes exactly one outbound request.
//! There are no retries here. Failures come back as [`DispatchResult`]
//! variants, never as errors or panics.

pub mod resend;
pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ChannelConfig;
use crate::types::{DispatchResult, Notification};

/// Channel error bodies are kept for diagnostics up to this many characters
pub const MAX_ERROR_BODY_CHARS: usize = 1024;

/// Delivers a rendered notification to one channel
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, channel: &ChannelConfig, notification: &Notification) -> DispatchResult;
}

/// Dispatcher performing real HTTP calls
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    /// Create a dispatcher whose calls are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("contact-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Create with an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, channel: &ChannelConfig, notification: &Notification) -> DispatchResult {
        let request = match channel {
            ChannelConfig::Telegram {
                api_base,
                bot_token,
                chat_id,
            } => telegram::build_request(
                &self.client,
                api_base,
                bot_token,
                chat_id,
                &notification.text,
            ),
            ChannelConfig::Email {
                api_url,
                api_key,
                from,
                to,
            } => resend::build_request(&self.client, api_url, api_key, from, to, notification),
        };

        let result = send(request).await;
        match &result {
            DispatchResult::Delivered => info!(channel = %channel.kind(), "Notification delivered"),
            DispatchResult::ChannelRejected { status, body } => {
                let detail = match channel {
                    ChannelConfig::Email { .. } => resend::describe_error(*status, body),
                    ChannelConfig::Telegram { .. } => body.clone(),
                };
                warn!(channel = %channel.kind(), status = *status, detail = %detail, "Channel rejected notification");
            }
            DispatchResult::TransportFailed { cause } => {
                warn!(channel = %channel.kind(), cause = %cause, "Channel unreachable");
            }
        }
        result
    }
}

/// Send one request and classify the outcome
async fn send(request: reqwest::RequestBuilder) -> DispatchResult {
    match request.send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                return DispatchResult::Delivered;
            }

            let body = response.text().await.unwrap_or_default();
            DispatchResult::ChannelRejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            }
        }
        // Strip the URL: the Telegram bot token is part of the path
        Err(e) => DispatchResult::TransportFailed {
            cause: e.without_url().to_string(),
        },
    }
}
