use serde::{Deserialize, Serialize};
use serde_json::Value;

/// System instruction prepended to every upstream conversation.
pub const SYSTEM_PROMPT: &str = "You are Voxita, a helpful assistant. If the user speaks Hindi, reply in Hindi; otherwise use English. Be concise.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub executed: bool,
    pub status: &'static str,
}

impl ChatResponse {
    /// Reply produced by a local command; the side effect already ran.
    pub fn local(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            executed: true,
            status: "success",
        }
    }

    /// Reply produced without a local side effect (override or upstream).
    pub fn relayed(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            executed: false,
            status: "success",
        }
    }
}

/// System prompt first, then prior turns, then the newest user message.
pub fn build_conversation(history: &[Message], user_message: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(SYSTEM_PROMPT));
    messages.extend_from_slice(history);
    messages.push(Message::user(user_message));
    messages
}

/// Best-effort display text from a chat-completions body: the first choice's
/// message content, or the serialized body when the shape is unexpected.
pub fn display_text(body: &Value) -> String {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conversation_orders_system_history_user() {
        let history = vec![
            Message::user("hi"),
            Message {
                role: Role::Assistant,
                content: "hello".to_string(),
            },
        ];
        let messages = build_conversation(&history, "how are you?");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[3], Message::user("how are you?"));
    }

    #[test]
    fn display_text_reads_first_choice() {
        let body = json!({"choices": [{"message": {"content": "pong"}}]});
        assert_eq!(display_text(&body), "pong");
    }

    #[test]
    fn display_text_falls_back_to_serialized_body() {
        let body = json!({"unexpected": true});
        assert_eq!(display_text(&body), body.to_string());
    }

    #[test]
    fn roles_serialize_lowercase() {
        let message = Message::system("x");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"role": "system", "content": "x"}));
    }
}
