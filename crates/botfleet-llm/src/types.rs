use serde::{Deserialize, Serialize};

/// Where to send a request: one bot's LLM binding (or the support-chat one).
#[derive(Debug, Clone)]
pub struct LlmTarget {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation sent to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeKind {
    Text,
    Json,
}

/// Knowledge base content injected into the system prompt.
#[derive(Debug, Clone)]
pub struct Knowledge {
    pub kind: KnowledgeKind,
    pub content: String,
}
