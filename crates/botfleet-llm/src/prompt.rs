//! System prompt composition, including knowledge base injection.

use crate::types::{Knowledge, KnowledgeKind};

/// Compose the effective system prompt for a call.
///
/// The bot's own prompt comes first; knowledge base content is appended with
/// a labelled header so the model can tell instruction from data.
pub fn compose_system_prompt(base: Option<&str>, knowledge: Option<&Knowledge>) -> Option<String> {
    let mut prompt = base.unwrap_or("").to_string();

    if let Some(kb) = knowledge {
        if !kb.content.trim().is_empty() {
            let header = match kb.kind {
                KnowledgeKind::Text => "\n\nБаза знаний:\n",
                KnowledgeKind::Json => "\n\nДанные из базы (JSON):\n",
            };
            prompt.push_str(header);
            prompt.push_str(&kb.content);
        }
    }

    if prompt.is_empty() {
        None
    } else {
        Some(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_only() {
        let p = compose_system_prompt(Some("Ты бот."), None);
        assert_eq!(p.as_deref(), Some("Ты бот."));
    }

    #[test]
    fn text_knowledge_appended_with_header() {
        let kb = Knowledge {
            kind: KnowledgeKind::Text,
            content: "факт".to_string(),
        };
        let p = compose_system_prompt(Some("Ты бот."), Some(&kb)).unwrap();
        assert_eq!(p, "Ты бот.\n\nБаза знаний:\nфакт");
    }

    #[test]
    fn json_knowledge_labelled_as_json() {
        let kb = Knowledge {
            kind: KnowledgeKind::Json,
            content: r#"{"a":1}"#.to_string(),
        };
        let p = compose_system_prompt(None, Some(&kb)).unwrap();
        assert!(p.starts_with("\n\nДанные из базы (JSON):\n"));
    }

    #[test]
    fn empty_everything_is_none() {
        assert!(compose_system_prompt(None, None).is_none());
        let kb = Knowledge {
            kind: KnowledgeKind::Text,
            content: "   ".to_string(),
        };
        assert!(compose_system_prompt(None, Some(&kb)).is_none());
    }
}
