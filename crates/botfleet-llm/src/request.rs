//! Request body shaping per provider family.

use crate::family::ProviderFamily;
use crate::types::{ChatMessage, Role};

pub const MAX_TOKENS: u32 = 1024;
pub const TEMPERATURE: f64 = 0.7;

/// Build the JSON request body for a call.
///
/// `messages` is the rolling history plus the current user message, oldest
/// first. The system prompt placement depends on the family: a separate
/// `system` field (Anthropic-shaped), the first `role: system` message
/// (OpenAI-shaped), or flattened into the single Gemini text part.
pub fn build_body(
    family: ProviderFamily,
    model: &str,
    system: Option<&str>,
    messages: &[ChatMessage],
    stream: bool,
) -> serde_json::Value {
    match family {
        f if f.is_anthropic_shaped() => {
            let msgs: Vec<serde_json::Value> = messages.iter().map(plain_message).collect();
            let mut body = serde_json::json!({
                "model": model,
                "messages": msgs,
                "max_tokens": MAX_TOKENS,
                "temperature": TEMPERATURE,
                "stream": stream,
            });
            if let Some(system) = system {
                body["system"] = serde_json::json!(system);
            }
            body
        }
        ProviderFamily::Gemini => {
            let text = flatten_for_gemini(system, messages);
            serde_json::json!({
                "contents": [{ "parts": [{ "text": text }] }],
                "generationConfig": {
                    "maxOutputTokens": MAX_TOKENS,
                    "temperature": TEMPERATURE,
                },
            })
        }
        _ => {
            // OpenAI-shaped (openai, deepseek, generic).
            let mut msgs: Vec<serde_json::Value> = Vec::with_capacity(messages.len() + 1);
            if let Some(system) = system {
                msgs.push(serde_json::json!({ "role": "system", "content": system }));
            }
            msgs.extend(messages.iter().map(plain_message));
            serde_json::json!({
                "model": model,
                "messages": msgs,
                "max_tokens": MAX_TOKENS,
                "temperature": TEMPERATURE,
                "stream": stream,
            })
        }
    }
}

fn plain_message(m: &ChatMessage) -> serde_json::Value {
    let role = match m.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    serde_json::json!({ "role": role, "content": m.content })
}

/// Gemini gets one text part: the system prompt, then the history flattened
/// to "User:"/"Assistant:" lines, then the current user message.
fn flatten_for_gemini(system: Option<&str>, messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    if let Some(system) = system {
        out.push_str(system);
    }
    for m in messages {
        if !out.is_empty() {
            out.push('\n');
        }
        match m.role {
            Role::User => {
                out.push_str("User: ");
                out.push_str(&m.content);
            }
            Role::Assistant => {
                out.push_str("Assistant: ");
                out.push_str(&m.content);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("tell me a joke"),
        ]
    }

    #[test]
    fn openai_system_is_first_message() {
        let body = build_body(
            ProviderFamily::OpenAi,
            "gpt-4o",
            Some("be brief"),
            &history(),
            false,
        );
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[0]["content"], "be brief");
        assert_eq!(msgs[3]["content"], "tell me a joke");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn anthropic_system_is_separate_field() {
        let body = build_body(
            ProviderFamily::Anthropic,
            "claude-3-5-haiku",
            Some("be brief"),
            &history(),
            false,
        );
        assert_eq!(body["system"], "be brief");
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "user");
    }

    #[test]
    fn anthropic_without_system_omits_field() {
        let body = build_body(ProviderFamily::Anthropic, "m", None, &history(), false);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn gemini_flattens_history_into_one_part() {
        let body = build_body(
            ProviderFamily::Gemini,
            "gemini-pro",
            Some("be brief"),
            &history(),
            false,
        );
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("be brief\nUser: hi\nAssistant: hello\nUser: tell me a joke"));
        // No OpenAI-style message array, no model field in the body.
        assert!(body.get("messages").is_none());
        assert!(body.get("model").is_none());
    }

    #[test]
    fn stream_flag_propagates() {
        let body = build_body(ProviderFamily::Generic, "m", None, &history(), true);
        assert_eq!(body["stream"], true);
    }
}
