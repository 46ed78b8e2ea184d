use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One managed Telegram bot identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRow {
    pub id: String,
    pub name: String,
    pub tag: Option<String>,
    pub token: String,
    pub api_url: String,
    pub api_key: String,
    pub ai_model: String,
    pub system_prompt: Option<String>,
    pub database_id: Option<String>,
    pub telegram_username: Option<String>,
    pub telegram_first_name: Option<String>,
    pub telegram_bot_id: Option<i64>,
    pub is_active: bool,
    pub is_running: bool,
    pub memory_enabled: bool,
    pub memory_messages_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating a bot. Discovered Telegram identity and
/// runtime flags are never supplied by the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub ai_model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub memory_enabled: bool,
    #[serde(default)]
    pub memory_messages_count: i64,
}

/// Partial update for a bot. `None` keeps the current value.
/// `database_id` and `system_prompt` use a double Option so an explicit
/// `null` clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotPatch {
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub tag: Option<Option<String>>,
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub ai_model: Option<String>,
    #[serde(default, with = "double_option")]
    pub system_prompt: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub database_id: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub memory_enabled: Option<bool>,
    pub memory_messages_count: Option<i64>,
}

/// Serde helper distinguishing an absent field from an explicit null.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

/// Knowledge base content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    Text,
    Json,
}

impl fmt::Display for DbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DbKind::Text => "text",
            DbKind::Json => "json",
        })
    }
}

impl FromStr for DbKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(DbKind::Text),
            "json" => Ok(DbKind::Json),
            _ => Err(()),
        }
    }
}

/// Knowledge base attached to bots via `database_id`.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseRow {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DbKind,
    pub description: Option<String>,
    pub content: String,
    /// Derived from content length, not stored.
    pub size: usize,
    pub created_at: String,
    pub updated_at: String,
}

/// Scripted action attached to one bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRow {
    pub id: String,
    pub bot_id: String,
    pub name: String,
    pub description: Option<String>,
    pub json_code: String,
    pub is_active: bool,
    pub is_multi_command: bool,
    pub parent_multi_command_id: Option<String>,
    pub allow_external_commands: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCommand {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub json_code: String,
    #[serde(default = "bool_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_multi_command: bool,
    #[serde(default)]
    pub parent_multi_command_id: Option<String>,
    #[serde(default)]
    pub allow_external_commands: bool,
}

fn bool_true() -> bool {
    true
}

/// One (user message, AI reply) exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatHistoryEntry {
    pub id: i64,
    pub bot_id: String,
    pub chat_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
