//! Response text extraction per provider family.

use crate::family::ProviderFamily;

/// Pull the reply text out of a provider response.
///
/// Returns `None` when the expected path is missing or empty — callers treat
/// that as an "empty AI response" failure.
pub fn extract_text(family: ProviderFamily, body: &serde_json::Value) -> Option<String> {
    let text = match family {
        ProviderFamily::Anthropic => anthropic_text(body),
        ProviderFamily::Langdock => {
            // Anthropic shape first, then the proxy's `message.content` variant.
            anthropic_text(body).or_else(|| {
                body.pointer("/message/content")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
        }
        ProviderFamily::OpenAi | ProviderFamily::DeepSeek => openai_text(body),
        ProviderFamily::Gemini => body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        ProviderFamily::Generic => openai_text(body)
            .or_else(|| anthropic_text(body))
            .or_else(|| field_string(body, "response"))
            .or_else(|| field_string(body, "text"))
            .or_else(|| field_string(body, "content")),
    };

    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn anthropic_text(body: &serde_json::Value) -> Option<String> {
    body.pointer("/content/0/text")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn openai_text(body: &serde_json::Value) -> Option<String> {
    body.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn field_string(body: &serde_json::Value, field: &str) -> Option<String> {
    body.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_shape() {
        let body = json!({"choices": [{"message": {"content": "hi there"}}]});
        assert_eq!(
            extract_text(ProviderFamily::OpenAi, &body).as_deref(),
            Some("hi there")
        );
    }

    #[test]
    fn anthropic_shape() {
        let body = json!({"content": [{"type": "text", "text": "hello"}]});
        assert_eq!(
            extract_text(ProviderFamily::Anthropic, &body).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn langdock_falls_back_to_message_content() {
        let body = json!({"message": {"content": "proxied"}});
        assert_eq!(
            extract_text(ProviderFamily::Langdock, &body).as_deref(),
            Some("proxied")
        );
    }

    #[test]
    fn gemini_shape() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "g"}]}}]});
        assert_eq!(
            extract_text(ProviderFamily::Gemini, &body).as_deref(),
            Some("g")
        );
    }

    #[test]
    fn generic_fallback_chain() {
        assert_eq!(
            extract_text(ProviderFamily::Generic, &json!({"response": "r"})).as_deref(),
            Some("r")
        );
        assert_eq!(
            extract_text(ProviderFamily::Generic, &json!({"text": "t"})).as_deref(),
            Some("t")
        );
        assert_eq!(
            extract_text(ProviderFamily::Generic, &json!({"content": "c"})).as_deref(),
            Some("c")
        );
        // OpenAI shape wins over the loose fields.
        let both = json!({"choices": [{"message": {"content": "win"}}], "text": "lose"});
        assert_eq!(
            extract_text(ProviderFamily::Generic, &both).as_deref(),
            Some("win")
        );
    }

    #[test]
    fn empty_or_missing_is_none() {
        assert!(extract_text(ProviderFamily::OpenAi, &json!({})).is_none());
        let blank = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(extract_text(ProviderFamily::OpenAi, &blank).is_none());
    }
}
