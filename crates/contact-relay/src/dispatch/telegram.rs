//! Telegram Bot API channel
//!
//! Messages are sent without `parse_mode`, so Markdown/HTML in the visitor's
//! message is delivered literally instead of breaking the call.

use serde::Serialize;

/// Telegram rejects `sendMessage` text longer than this
pub const MAX_TEXT_CHARS: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

/// Build the `sendMessage` call
pub(crate) fn build_request(
    client: &reqwest::Client,
    api_base: &str,
    bot_token: &str,
    chat_id: &str,
    text: &str,
) -> reqwest::RequestBuilder {
    let text = truncate(text, MAX_TEXT_CHARS);
    let payload = SendMessagePayload {
        chat_id,
        text,
        disable_web_page_preview: true,
    };

    client
        .post(format!("{}/bot{}/sendMessage", api_base, bot_token))
        .json(&payload)
}

/// Cut `text` to at most `max_chars` characters
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
