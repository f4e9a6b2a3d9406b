use super::*;
use serde_json::json;

#[test]
fn test_detect_api_format() {
    assert_eq!(
        detect_api_format("claude-sonnet-4-20250514", "https://example.com/v1"),
        ApiFormat::Claude
    );
    assert_eq!(detect_api_format("gpt-4o", "https://api.anthropic.com"), ApiFormat::Claude);
    assert_eq!(detect_api_format("gpt-4o", "https://api.openai.com/v1"), ApiFormat::OpenAI);
    assert_eq!(detect_api_format("deepseek-chat", "https://api.deepseek.com/v1"), ApiFormat::OpenAI);
}

#[test]
fn test_client_trims_trailing_slash() {
    let client = LlmClient::new("https://api.anthropic.com/", "k");
    assert_eq!(client.api_base(), "https://api.anthropic.com");
}

#[test]
fn test_claude_messages_url() {
    assert_eq!(
        claude::messages_url("https://api.anthropic.com"),
        "https://api.anthropic.com/v1/messages"
    );
    assert_eq!(
        claude::messages_url("https://proxy.local/v1"),
        "https://proxy.local/v1/messages"
    );
}

#[test]
fn test_claude_request_body() {
    let body = claude::request_body("claude-x", 20000, "hello");
    assert_eq!(body["model"], "claude-x");
    assert_eq!(body["max_tokens"], 20000);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "hello");
}

#[test]
fn test_claude_response_text_joins_text_blocks() {
    let body = json!({
        "content": [
            { "type": "text", "text": "part one " },
            { "type": "tool_use", "id": "t1", "name": "x", "input": {} },
            { "type": "text", "text": "part two" }
        ]
    });
    assert_eq!(claude::response_text(&body).as_deref(), Some("part one part two"));
    assert_eq!(claude::response_text(&json!({ "content": [] })), None);
    assert_eq!(claude::response_text(&json!({ "error": "x" })), None);
}

#[test]
fn test_openai_response_text() {
    let body = json!({
        "choices": [ { "index": 0, "message": { "role": "assistant", "content": "hi" } } ]
    });
    assert_eq!(openai::response_text(&body).as_deref(), Some("hi"));
    assert_eq!(openai::response_text(&json!({ "choices": [] })), None);
    assert_eq!(
        openai::completions_url("https://api.openai.com/v1"),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn test_unreachable_host_is_transport_error() {
    // Port 9 (discard) on localhost is closed in test environments.
    let client = LlmClient::new("http://127.0.0.1:9", "k");
    let err = client.complete("gpt-4o", 16, "hi").unwrap_err();
    assert!(matches!(err, CollaboratorError::Transport(_)));
}
