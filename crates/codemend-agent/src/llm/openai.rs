//! OpenAI-compatible chat completions.

use serde_json::{json, Value};

pub(super) fn completions_url(api_base: &str) -> String {
    format!("{}/chat/completions", api_base)
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

pub(super) fn response_text(body: &Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
