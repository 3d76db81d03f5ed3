//! Resend email channel
//!
//! Sends directly via the Resend API (https://api.resend.com/emails) with
//! bearer-token auth.

use serde::{Deserialize, Serialize};

use crate::format::render_html;
use crate::types::Notification;

/// Resend API request payload
#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Resend API error response
#[derive(Debug, Deserialize)]
struct ResendErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Build the send-email call
pub(crate) fn build_request(
    client: &reqwest::Client,
    api_url: &str,
    api_key: &str,
    from: &str,
    to: &str,
    notification: &Notification,
) -> reqwest::RequestBuilder {
    let html = render_html(&notification.text);
    let payload = ResendPayload {
        from,
        to: [to],
        subject: &notification.subject,
        html: &html,
        text: &notification.text,
    };

    client.post(api_url).bearer_auth(api_key).json(&payload)
}

/// Short operator-facing description of a Resend error body
pub(crate) fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ResendErrorResponse>(body) {
        Ok(err) => err
            .message
            .or(err.name)
            .unwrap_or_else(|| format!("HTTP {}", status)),
        Err(_) => format!("HTTP {}", status),
    }
}
