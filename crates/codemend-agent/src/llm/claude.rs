//! Anthropic Claude API implementation.

use serde_json::{json, Value};

pub(super) const API_VERSION: &str = "2023-06-01";

/// `{base}/v1/messages`, tolerating a base that already ends in `/v1`.
pub(super) fn messages_url(api_base: &str) -> String {
    if api_base.ends_with("/v1") {
        format!("{}/messages", api_base)
    } else {
        format!("{}/v1/messages", api_base)
    }
}

pub(super) fn request_body(model: &str, max_tokens: u32, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [
            { "role": "user", "content": prompt }
        ]
    })
}

/// Concatenate all `text` content blocks.
pub(super) fn response_text(body: &Value) -> Option<String> {
    let blocks = body.get("content")?.as_array()?;
    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
