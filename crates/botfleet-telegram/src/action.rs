//! Command `json_code` model.
//!
//! The stored JSON is validated for well-formedness at write time; the shape
//! is interpreted best-effort here at execution time, so an operator typo
//! degrades to the `Other` branch instead of failing the command outright.

use serde_json::Value;

/// One inline button: label plus the callback payload (command name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

/// Parsed command action.
#[derive(Debug, Clone)]
pub enum CommandAction {
    /// Text plus an inline keyboard.
    Menu {
        text: Option<String>,
        buttons: Vec<Vec<Button>>,
    },
    /// Plain text reply.
    Message { text: Option<String> },
    /// Reply keyboard; always sent as a new message.
    Keyboard {
        rows: Vec<Vec<String>>,
        one_time: bool,
    },
    /// Enter a multi-command context.
    MultiCommand { welcome: Option<String> },
    /// Unknown type: send `text` if present, else the pretty-printed JSON.
    Other { text: Option<String>, raw: Value },
}

impl CommandAction {
    pub fn parse(json_code: &str) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_str(json_code)?;
        let kind = raw.get("type").and_then(|v| v.as_str()).unwrap_or("");

        let action = match kind {
            "menu" => CommandAction::Menu {
                text: string_field(&raw, "text"),
                buttons: parse_inline_buttons(raw.get("buttons")),
            },
            "message" => CommandAction::Message {
                text: string_field(&raw, "text"),
            },
            "keyboard" => CommandAction::Keyboard {
                rows: parse_keyboard_rows(raw.get("buttons")),
                one_time: raw.get("one_time").and_then(|v| v.as_bool()).unwrap_or(false),
            },
            "multi_command" => CommandAction::MultiCommand {
                welcome: string_field(&raw, "welcome_message"),
            },
            _ => CommandAction::Other {
                text: string_field(&raw, "text"),
                raw,
            },
        };
        Ok(action)
    }
}

fn string_field(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Rows of `{text, callback_data}`. A button without callback_data falls
/// back to its label, so `{"text": "help"}` routes to the `help` command.
fn parse_inline_buttons(buttons: Option<&Value>) -> Vec<Vec<Button>> {
    let rows = match buttons.and_then(|v| v.as_array()) {
        Some(rows) => rows,
        None => return Vec::new(),
    };
    rows.iter()
        .filter_map(|row| row.as_array())
        .map(|row| {
            row.iter()
                .filter_map(|b| {
                    let text = b.get("text").and_then(|v| v.as_str())?.to_string();
                    let callback_data = b
                        .get("callback_data")
                        .and_then(|v| v.as_str())
                        .unwrap_or(&text)
                        .to_string();
                    Some(Button {
                        text,
                        callback_data,
                    })
                })
                .collect()
        })
        .filter(|row: &Vec<Button>| !row.is_empty())
        .collect()
}

/// Reply-keyboard rows: entries may be plain strings or `{text}` objects.
fn parse_keyboard_rows(buttons: Option<&Value>) -> Vec<Vec<String>> {
    let rows = match buttons.and_then(|v| v.as_array()) {
        Some(rows) => rows,
        None => return Vec::new(),
    };
    rows.iter()
        .filter_map(|row| row.as_array())
        .map(|row| {
            row.iter()
                .filter_map(|b| {
                    b.as_str()
                        .map(str::to_string)
                        .or_else(|| b.get("text").and_then(|v| v.as_str()).map(str::to_string))
                })
                .collect()
        })
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_menu_with_buttons() {
        let json = r#"{
            "type": "menu",
            "text": "Главное меню",
            "buttons": [[{"text": "A", "callback_data": "a"}], [{"text": "B"}]]
        }"#;
        match CommandAction::parse(json).unwrap() {
            CommandAction::Menu { text, buttons } => {
                assert_eq!(text.as_deref(), Some("Главное меню"));
                assert_eq!(buttons.len(), 2);
                assert_eq!(buttons[0][0].callback_data, "a");
                // Missing callback_data falls back to the label.
                assert_eq!(buttons[1][0].callback_data, "B");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_keyboard_with_mixed_rows() {
        let json = r#"{
            "type": "keyboard",
            "buttons": [["Да", "Нет"], [{"text": "Отмена"}]],
            "one_time": true
        }"#;
        match CommandAction::parse(json).unwrap() {
            CommandAction::Keyboard { rows, one_time } => {
                assert!(one_time);
                assert_eq!(rows, vec![vec!["Да".to_string(), "Нет".to_string()], vec![
                    "Отмена".to_string()
                ]]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_multi_command_welcome() {
        let json = r#"{"type": "multi_command", "welcome_message": "Добро пожаловать"}"#;
        match CommandAction::parse(json).unwrap() {
            CommandAction::MultiCommand { welcome } => {
                assert_eq!(welcome.as_deref(), Some("Добро пожаловать"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_becomes_other() {
        let json = r#"{"type": "webhook", "url": "https://example.com"}"#;
        match CommandAction::parse(json).unwrap() {
            CommandAction::Other { text, raw } => {
                assert!(text.is_none());
                assert_eq!(raw["url"], "https://example.com");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(CommandAction::parse("{nope").is_err());
    }
}
