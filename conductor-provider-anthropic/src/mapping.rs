//! Translate between [`LmMessage`] and the Anthropic Messages API's wire shape.

use conductor_protocol::{LmError, LmMessage, Role};
use serde_json::{json, Value};

/// Build the request body for `POST /v1/messages`.
///
/// Anthropic splits the system prompt out of the `messages` array; leading
/// `Role::System` messages are concatenated (newline-joined) into the
/// top-level `system` field, everything else becomes a `user`/`assistant`
/// turn in order.
pub(crate) fn to_api_request(messages: &[LmMessage], model: &str, max_tokens: u32) -> Value {
    let mut system = Vec::new();
    let mut turns = Vec::new();

    for message in messages {
        match message.role {
            Role::System => system.push(message.content.as_str()),
            Role::User => turns.push(json!({ "role": "user", "content": message.content })),
            Role::Assistant => turns.push(json!({ "role": "assistant", "content": message.content })),
            _ => {}
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": turns,
    });
    if !system.is_empty() {
        body["system"] = Value::String(system.join("\n"));
    }
    body
}

/// Extract the model's text reply from a successful response body.
pub(crate) fn from_api_response(json: &Value) -> Result<String, LmError> {
    json.get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.iter().find(|b| b.get("type").and_then(Value::as_str) == Some("text")))
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| LmError::InvalidRequest("response contained no text content block".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_are_hoisted_and_joined() {
        let messages = vec![
            LmMessage::system("rule one"),
            LmMessage::system("rule two"),
            LmMessage::user("hello"),
        ];
        let body = to_api_request(&messages, "claude-x", 1024);
        assert_eq!(body["system"], "rule one\nrule two");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn no_system_field_when_no_system_messages() {
        let body = to_api_request(&[LmMessage::user("hi")], "claude-x", 1024);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn extracts_the_first_text_block() {
        let json = json!({ "content": [{ "type": "text", "text": "hello there" }] });
        assert_eq!(from_api_response(&json).unwrap(), "hello there");
    }

    #[test]
    fn rejects_a_response_with_no_text_block() {
        let json = json!({ "content": [] });
        assert!(from_api_response(&json).is_err());
    }
}
