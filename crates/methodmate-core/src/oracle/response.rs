//! Chat response shapes returned by the oracle API.
//!
//! Three shapes are seen in practice: the v2 `messages` list, the v3
//! `data.messages` envelope, and a bare `answer`. [`ChatResponse::answer`]
//! is the single adapter that turns any of them into answer text.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatData {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Known response payloads, tried in declaration order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatResponse {
    V2 { messages: Vec<ChatMessage> },
    V3 { data: ChatData },
    Direct { answer: String },
}

impl ChatResponse {
    /// Parse a response body into one of the known shapes.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Extract the answer text, if the payload carries one.
    ///
    /// For v2 only an assistant message of type `answer` counts; `verbose`
    /// and `follow_up` messages are never answer text.
    pub fn answer(&self) -> Option<&str> {
        let text = match self {
            ChatResponse::V2 { messages } => messages
                .iter()
                .find(|m| m.is_assistant() && m.kind == "answer")
                .map(|m| m.content.as_str()),
            ChatResponse::V3 { data } => data
                .messages
                .iter()
                .find(|m| m.is_assistant())
                .map(|m| m.content.as_str()),
            ChatResponse::Direct { answer } => Some(answer.as_str()),
        }?;
        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }
}
