//! Notification rendering
//!
//! The message body is interpolated verbatim. Channels must therefore send
//! this text in a non-interpreting mode (Telegram without `parse_mode`), and
//! the HTML rendering escapes it.

use std::fmt::Write;

use crate::types::{RequestContext, Submission};
use crate::UNKNOWN;

/// Subject prefix for the email channel
pub const SUBJECT_PREFIX: &str = "[Portfolio Contact]";

/// Render the plain-text notification body
pub fn format_notification(
    submission: &Submission,
    context: &RequestContext,
    fingerprint: &str,
) -> String {
    let hints = &submission.hints;
    let number = |n: Option<f64>| n.map_or_else(|| UNKNOWN.to_string(), |n| n.to_string());
    let memory = hints
        .memory
        .map_or_else(|| UNKNOWN.to_string(), |gb| format!("{} GB", gb));

    let fields = [
        ("Email", submission.email.clone()),
        ("Device", context.device_class.to_string()),
        ("Message", submission.message.clone()),
        ("Fingerprint", fingerprint.to_string()),
        ("IP", context.ip.clone()),
        ("Subnet", context.subnet.clone()),
        ("Country", or_unknown(context.country.as_deref())),
        ("ASN", or_unknown(context.asn.as_deref())),
        ("Timezone", or_unknown(hints.timezone.as_deref())),
        ("Locale", or_unknown(hints.locale.as_deref())),
        ("Screen", or_unknown(hints.screen.as_deref())),
        ("CPU Cores", number(hints.cores)),
        ("Device Memory", memory),
        ("User-Agent", context.user_agent.clone()),
        ("Accept-Language", or_unknown(context.accept_language.as_deref())),
        ("Protocol", or_unknown(context.forwarded_proto.as_deref())),
        ("Received", context.received_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ];

    let mut text = String::from("New contact form message\n");
    for (label, value) in fields {
        // Writing to a String cannot fail
        let _ = write!(text, "\n{}:\n{}\n", label, value);
    }
    text
}

/// Email subject for a submission
pub fn subject_line(submission: &Submission) -> String {
    format!("{} New message from {}", SUBJECT_PREFIX, submission.email)
}

/// Wrap plain text in an escaped `<pre>` block for HTML email
pub fn render_html(text: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <pre style="white-space: pre-wrap; word-break: break-word; color: #333; font-size: 14px;">{}</pre>
</body>
</html>"#,
        escape_html(text)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn or_unknown(value: Option<&str>) -> String {
    value.unwrap_or(UNKNOWN).to_string()
}
