//! Persistent state for bots, knowledge databases, commands, chat history,
//! admin users and settings.
//!
//! Thread-safe: wraps a single SQLite connection in a Mutex (writers are
//! serialized internally, callers see a synchronous API).

use std::sync::Mutex;

use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::*;

/// Per-(bot, chat) history retention.
const HISTORY_KEEP: i64 = 100;
/// Upper bound on history rows injected into a memory-aware LLM call.
pub const MEMORY_MAX: i64 = 50;

pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn open(path: &str) -> Result<Self> {
        if let Some(dir) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self::new(Connection::open(path)?)
    }

    // --- bots ---------------------------------------------------------------

    pub fn insert_bot(&self, new: &NewBot) -> Result<BotRow> {
        let db = self.db.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let count = new.memory_messages_count.clamp(0, MEMORY_MAX);

        db.execute(
            "INSERT INTO bots
             (id, name, tag, token, api_url, api_key, ai_model, system_prompt,
              database_id, is_active, is_running, memory_enabled,
              memory_messages_count, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,0,0,?10,?11,?12,?12)",
            rusqlite::params![
                id,
                new.name,
                new.tag,
                new.token,
                new.api_url,
                new.api_key,
                new.ai_model,
                new.system_prompt,
                new.database_id,
                new.memory_enabled,
                count,
                now,
            ],
        )?;

        db.query_row(&bot_select("WHERE id = ?1"), [&id], row_to_bot)
            .map_err(Into::into)
    }

    pub fn get_bot(&self, id: &str) -> Result<BotRow> {
        let db = self.db.lock().unwrap();
        db.query_row(&bot_select("WHERE id = ?1"), [id], row_to_bot)
            .map_err(|e| not_found(e, "bot", id))
    }

    pub fn list_bots(&self) -> Result<Vec<BotRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&bot_select("ORDER BY created_at"))?;
        let rows = stmt.query_map([], row_to_bot)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Bots the operator wants running (`is_active = 1`).
    pub fn active_bots(&self) -> Result<Vec<BotRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&bot_select("WHERE is_active = 1 ORDER BY created_at"))?;
        let rows = stmt.query_map([], row_to_bot)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Ids of bots whose persisted flag claims a live worker.
    pub fn bots_marked_running(&self) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT id FROM bots WHERE is_running = 1")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Merge a patch into an existing bot row. Returns the updated row.
    pub fn update_bot(&self, id: &str, patch: &BotPatch) -> Result<BotRow> {
        let current = self.get_bot(id)?;
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();

        let memory_count = patch
            .memory_messages_count
            .unwrap_or(current.memory_messages_count)
            .clamp(0, MEMORY_MAX);

        db.execute(
            "UPDATE bots SET name=?1, tag=?2, token=?3, api_url=?4, api_key=?5,
             ai_model=?6, system_prompt=?7, database_id=?8, is_active=?9,
             memory_enabled=?10, memory_messages_count=?11, updated_at=?12
             WHERE id=?13",
            rusqlite::params![
                patch.name.as_ref().unwrap_or(&current.name),
                patch.tag.clone().unwrap_or(current.tag),
                patch.token.as_ref().unwrap_or(&current.token),
                patch.api_url.as_ref().unwrap_or(&current.api_url),
                patch.api_key.as_ref().unwrap_or(&current.api_key),
                patch.ai_model.as_ref().unwrap_or(&current.ai_model),
                patch.system_prompt.clone().unwrap_or(current.system_prompt),
                patch.database_id.clone().unwrap_or(current.database_id),
                patch.is_active.unwrap_or(current.is_active),
                patch.memory_enabled.unwrap_or(current.memory_enabled),
                memory_count,
                now,
                id,
            ],
        )?;

        db.query_row(&bot_select("WHERE id = ?1"), [id], row_to_bot)
            .map_err(Into::into)
    }

    /// Persist the supervisor's truth about a worker.
    pub fn set_running(&self, id: &str, running: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "UPDATE bots SET is_running=?1, updated_at=?2 WHERE id=?3",
            rusqlite::params![running, now, id],
        )?;
        Ok(())
    }

    pub fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "UPDATE bots SET is_active=?1, updated_at=?2 WHERE id=?3",
            rusqlite::params![active, now, id],
        )?;
        Ok(())
    }

    /// Startup repair: no worker can exist yet, so no row may claim one.
    pub fn reset_all_running(&self) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n = db.execute("UPDATE bots SET is_running = 0 WHERE is_running = 1", [])?;
        if n > 0 {
            debug!(count = n, "cleared stale is_running flags");
        }
        Ok(n)
    }

    /// Persist identity discovered via getMe.
    pub fn set_telegram_identity(
        &self,
        id: &str,
        username: Option<&str>,
        first_name: &str,
        bot_id: i64,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "UPDATE bots SET telegram_username=?1, telegram_first_name=?2,
             telegram_bot_id=?3, updated_at=?4 WHERE id=?5",
            rusqlite::params![username, first_name, bot_id, now, id],
        )?;
        Ok(())
    }

    /// Delete a bot. Commands and history cascade.
    pub fn delete_bot(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM bots WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "bot",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // --- knowledge databases ------------------------------------------------

    pub fn insert_database(
        &self,
        name: &str,
        kind: DbKind,
        description: Option<&str>,
        content: &str,
    ) -> Result<DatabaseRow> {
        if kind == DbKind::Json {
            serde_json::from_str::<serde_json::Value>(content)
                .map_err(|e| StoreError::InvalidJson(e.to_string()))?;
        }
        let db = self.db.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO databases (id, name, type, description, content, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?6)",
            rusqlite::params![id, name, kind.to_string(), description, content, now],
        )?;
        db.query_row(DB_SELECT_ONE, [&id], row_to_database)
            .map_err(Into::into)
    }

    pub fn get_database(&self, id: &str) -> Result<DatabaseRow> {
        let db = self.db.lock().unwrap();
        db.query_row(DB_SELECT_ONE, [id], row_to_database)
            .map_err(|e| not_found(e, "database", id))
    }

    pub fn list_databases(&self) -> Result<Vec<DatabaseRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, name, type, description, content, created_at, updated_at
             FROM databases ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_database)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn update_database(
        &self,
        id: &str,
        name: &str,
        kind: DbKind,
        description: Option<&str>,
        content: &str,
    ) -> Result<DatabaseRow> {
        if kind == DbKind::Json {
            serde_json::from_str::<serde_json::Value>(content)
                .map_err(|e| StoreError::InvalidJson(e.to_string()))?;
        }
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let n = db.execute(
            "UPDATE databases SET name=?1, type=?2, description=?3, content=?4, updated_at=?5
             WHERE id=?6",
            rusqlite::params![name, kind.to_string(), description, content, now, id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "database",
                id: id.to_string(),
            });
        }
        db.query_row(DB_SELECT_ONE, [id], row_to_database)
            .map_err(Into::into)
    }

    pub fn database_referenced(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM bots WHERE database_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete a knowledge database. Refused while any bot references it.
    pub fn delete_database(&self, id: &str) -> Result<()> {
        if self.database_referenced(id)? {
            return Err(StoreError::DatabaseInUse { id: id.to_string() });
        }
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM databases WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "database",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    // --- commands -----------------------------------------------------------

    pub fn insert_command(&self, bot_id: &str, new: &NewCommand) -> Result<CommandRow> {
        serde_json::from_str::<serde_json::Value>(&new.json_code)
            .map_err(|e| StoreError::InvalidJson(e.to_string()))?;

        let db = self.db.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO bot_commands
             (id, bot_id, name, description, json_code, is_active, is_multi_command,
              parent_multi_command_id, allow_external_commands, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?10)",
            rusqlite::params![
                id,
                bot_id,
                new.name,
                new.description,
                new.json_code,
                new.is_active,
                new.is_multi_command,
                new.parent_multi_command_id,
                new.allow_external_commands,
                now,
            ],
        )
        .map_err(|e| map_constraint(e, &new.name))?;

        db.query_row(&command_select("WHERE id = ?1"), [&id], row_to_command)
            .map_err(Into::into)
    }

    pub fn get_command(&self, bot_id: &str, cmd_id: &str) -> Result<CommandRow> {
        let db = self.db.lock().unwrap();
        db.query_row(
            &command_select("WHERE id = ?1 AND bot_id = ?2"),
            [cmd_id, bot_id],
            row_to_command,
        )
        .map_err(|e| not_found(e, "command", cmd_id))
    }

    pub fn list_commands(&self, bot_id: &str) -> Result<Vec<CommandRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&command_select("WHERE bot_id = ?1 ORDER BY created_at"))?;
        let rows = stmt.query_map([bot_id], row_to_command)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Active commands of a bot, in creation order (visibility order).
    pub fn active_commands(&self, bot_id: &str) -> Result<Vec<CommandRow>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&command_select(
            "WHERE bot_id = ?1 AND is_active = 1 ORDER BY created_at",
        ))?;
        let rows = stmt.query_map([bot_id], row_to_command)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn update_command(&self, bot_id: &str, cmd_id: &str, new: &NewCommand) -> Result<CommandRow> {
        serde_json::from_str::<serde_json::Value>(&new.json_code)
            .map_err(|e| StoreError::InvalidJson(e.to_string()))?;

        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let n = db
            .execute(
                "UPDATE bot_commands SET name=?1, description=?2, json_code=?3, is_active=?4,
                 is_multi_command=?5, parent_multi_command_id=?6, allow_external_commands=?7,
                 updated_at=?8
                 WHERE id=?9 AND bot_id=?10",
                rusqlite::params![
                    new.name,
                    new.description,
                    new.json_code,
                    new.is_active,
                    new.is_multi_command,
                    new.parent_multi_command_id,
                    new.allow_external_commands,
                    now,
                    cmd_id,
                    bot_id,
                ],
            )
            .map_err(|e| map_constraint(e, &new.name))?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "command",
                id: cmd_id.to_string(),
            });
        }
        db.query_row(&command_select("WHERE id = ?1"), [cmd_id], row_to_command)
            .map_err(Into::into)
    }

    pub fn delete_command(&self, bot_id: &str, cmd_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM bot_commands WHERE id = ?1 AND bot_id = ?2",
            [cmd_id, bot_id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "command",
                id: cmd_id.to_string(),
            });
        }
        Ok(())
    }

    // --- chat history -------------------------------------------------------

    /// Append one exchange, then prune the pair's history to the newest 100.
    pub fn append_history(
        &self,
        bot_id: &str,
        chat_id: &str,
        user_message: &str,
        ai_response: &str,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO chat_history (bot_id, chat_id, user_message, ai_response, timestamp)
             VALUES (?1,?2,?3,?4,?5)",
            rusqlite::params![bot_id, chat_id, user_message, ai_response, now],
        )?;
        db.execute(
            "DELETE FROM chat_history
             WHERE bot_id = ?1 AND chat_id = ?2 AND id NOT IN (
                 SELECT id FROM chat_history
                 WHERE bot_id = ?1 AND chat_id = ?2
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?3
             )",
            rusqlite::params![bot_id, chat_id, HISTORY_KEEP],
        )?;
        Ok(())
    }

    /// Newest `limit` exchanges for a (bot, chat) pair, newest first.
    pub fn recent_exchanges(
        &self,
        bot_id: &str,
        chat_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatHistoryEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, bot_id, chat_id, user_message, ai_response, timestamp
             FROM chat_history
             WHERE bot_id = ?1 AND chat_id = ?2
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(rusqlite::params![bot_id, chat_id, limit], row_to_history)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// All history of a bot (admin view), newest first.
    pub fn list_history(&self, bot_id: &str, limit: i64) -> Result<Vec<ChatHistoryEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, bot_id, chat_id, user_message, ai_response, timestamp
             FROM chat_history
             WHERE bot_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![bot_id, limit], row_to_history)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn delete_history(&self, bot_id: &str) -> Result<usize> {
        let db = self.db.lock().unwrap();
        Ok(db.execute("DELETE FROM chat_history WHERE bot_id = ?1", [bot_id])?)
    }

    pub fn delete_history_entry(&self, bot_id: &str, entry_id: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM chat_history WHERE bot_id = ?1 AND id = ?2",
            rusqlite::params![bot_id, entry_id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "history entry",
                id: entry_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn history_count(&self, bot_id: &str, chat_id: &str) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT COUNT(*) FROM chat_history WHERE bot_id = ?1 AND chat_id = ?2",
            [bot_id, chat_id],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    /// Message counts grouped by a strftime bucket, for the dashboard charts.
    pub fn message_counts(&self, since: &str, bucket_fmt: &str) -> Result<Vec<(String, i64)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT strftime(?1, timestamp) AS bucket, COUNT(*)
             FROM chat_history
             WHERE timestamp >= ?2
             GROUP BY bucket
             ORDER BY bucket",
        )?;
        let rows = stmt.query_map([bucket_fmt, since], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // --- users --------------------------------------------------------------

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let db = self.db.lock().unwrap();
        let user = db
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .ok();
        Ok(user)
    }

    pub fn insert_user(&self, email: &str, password_hash: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT OR IGNORE INTO users (id, email, password_hash, created_at)
             VALUES (?1,?2,?3,?4)",
            rusqlite::params![id, email, password_hash, now],
        )?;
        Ok(())
    }

    // --- settings -----------------------------------------------------------

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let value = db
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .ok();
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    pub fn list_settings(&self) -> Result<Vec<Setting>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(Setting {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

// --- row mappers and SQL fragments -----------------------------------------

fn bot_select(tail: &str) -> String {
    format!(
        "SELECT id, name, tag, token, api_url, api_key, ai_model, system_prompt,
                database_id, telegram_username, telegram_first_name, telegram_bot_id,
                is_active, is_running, memory_enabled, memory_messages_count,
                created_at, updated_at
         FROM bots {tail}"
    )
}

fn command_select(tail: &str) -> String {
    format!(
        "SELECT id, bot_id, name, description, json_code, is_active, is_multi_command,
                parent_multi_command_id, allow_external_commands, created_at, updated_at
         FROM bot_commands {tail}"
    )
}

const DB_SELECT_ONE: &str =
    "SELECT id, name, type, description, content, created_at, updated_at
     FROM databases WHERE id = ?1";

fn row_to_bot(row: &rusqlite::Row<'_>) -> rusqlite::Result<BotRow> {
    Ok(BotRow {
        id: row.get(0)?,
        name: row.get(1)?,
        tag: row.get(2)?,
        token: row.get(3)?,
        api_url: row.get(4)?,
        api_key: row.get(5)?,
        ai_model: row.get(6)?,
        system_prompt: row.get(7)?,
        database_id: row.get(8)?,
        telegram_username: row.get(9)?,
        telegram_first_name: row.get(10)?,
        telegram_bot_id: row.get(11)?,
        is_active: row.get(12)?,
        is_running: row.get(13)?,
        memory_enabled: row.get(14)?,
        memory_messages_count: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn row_to_command(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommandRow> {
    Ok(CommandRow {
        id: row.get(0)?,
        bot_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        json_code: row.get(4)?,
        is_active: row.get(5)?,
        is_multi_command: row.get(6)?,
        parent_multi_command_id: row.get(7)?,
        allow_external_commands: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn row_to_database(row: &rusqlite::Row<'_>) -> rusqlite::Result<DatabaseRow> {
    let kind_str: String = row.get(2)?;
    let content: String = row.get(4)?;
    Ok(DatabaseRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: kind_str.parse().unwrap_or(DbKind::Text),
        description: row.get(3)?,
        size: content.len(),
        content,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatHistoryEntry> {
    Ok(ChatHistoryEntry {
        id: row.get(0)?,
        bot_id: row.get(1)?,
        chat_id: row.get(2)?,
        user_message: row.get(3)?,
        ai_response: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

fn not_found(e: rusqlite::Error, what: &'static str, id: &str) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
            what,
            id: id.to_string(),
        },
        other => StoreError::Sqlite(other),
    }
}

fn map_constraint(e: rusqlite::Error, name: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::NameTaken {
                name: name.to_string(),
            };
        }
    }
    StoreError::Sqlite(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> Store {
        Store::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn sample_bot(store: &Store, name: &str) -> BotRow {
        store
            .insert_bot(&NewBot {
                name: name.to_string(),
                tag: None,
                token: "123:abc".to_string(),
                api_url: "https://api.openai.com".to_string(),
                api_key: "sk-test".to_string(),
                ai_model: "gpt-4o".to_string(),
                system_prompt: Some("You are helpful".to_string()),
                database_id: None,
                memory_enabled: true,
                memory_messages_count: 10,
            })
            .unwrap()
    }

    fn sample_command(name: &str) -> NewCommand {
        NewCommand {
            name: name.to_string(),
            description: Some("open the menu".to_string()),
            json_code: r#"{"type":"message","text":"hi"}"#.to_string(),
            is_active: true,
            is_multi_command: false,
            parent_multi_command_id: None,
            allow_external_commands: false,
        }
    }

    #[test]
    fn create_then_read_bot_round_trips() {
        let store = test_store();
        let bot = sample_bot(&store, "alpha");
        let read = store.get_bot(&bot.id).unwrap();
        assert_eq!(read.name, "alpha");
        assert_eq!(read.token, "123:abc");
        assert!(!read.is_running);
        assert!(read.memory_enabled);
    }

    #[test]
    fn memory_count_is_clamped_on_write() {
        let store = test_store();
        let bot = store
            .insert_bot(&NewBot {
                name: "clamped".to_string(),
                tag: None,
                token: "t".to_string(),
                api_url: "u".to_string(),
                api_key: "k".to_string(),
                ai_model: "m".to_string(),
                system_prompt: None,
                database_id: None,
                memory_enabled: true,
                memory_messages_count: 9000,
            })
            .unwrap();
        assert_eq!(bot.memory_messages_count, 50);

        let patched = store
            .update_bot(
                &bot.id,
                &BotPatch {
                    memory_messages_count: Some(-5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(patched.memory_messages_count, 0);
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let store = test_store();
        let bot = sample_bot(&store, "beta");
        let patched = store
            .update_bot(
                &bot.id,
                &BotPatch {
                    system_prompt: Some(Some("new prompt".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(patched.system_prompt.as_deref(), Some("new prompt"));
        assert_eq!(patched.token, bot.token);
        assert_eq!(patched.name, bot.name);
    }

    #[test]
    fn command_names_unique_per_bot() {
        let store = test_store();
        let a = sample_bot(&store, "a");
        let b = sample_bot(&store, "b");

        store.insert_command(&a.id, &sample_command("menu")).unwrap();
        // Same name on another bot is fine.
        store.insert_command(&b.id, &sample_command("menu")).unwrap();
        // Same name on the same bot is not.
        let err = store.insert_command(&a.id, &sample_command("menu")).unwrap_err();
        assert!(matches!(err, StoreError::NameTaken { .. }));
    }

    #[test]
    fn command_json_validated_at_write() {
        let store = test_store();
        let bot = sample_bot(&store, "j");
        let mut cmd = sample_command("bad");
        cmd.json_code = "{not json".to_string();
        let err = store.insert_command(&bot.id, &cmd).unwrap_err();
        assert!(matches!(err, StoreError::InvalidJson(_)));
    }

    #[test]
    fn history_pruned_to_100() {
        let store = test_store();
        let bot = sample_bot(&store, "h");
        for i in 0..150 {
            store
                .append_history(&bot.id, "c1", &format!("u{i}"), &format!("a{i}"))
                .unwrap();
        }
        assert_eq!(store.history_count(&bot.id, "c1").unwrap(), 100);

        // Newest five are the last five appended, newest first.
        let recent = store.recent_exchanges(&bot.id, "c1", 5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].user_message, "u149");
        assert_eq!(recent[4].user_message, "u145");
    }

    #[test]
    fn history_scoped_per_chat() {
        let store = test_store();
        let bot = sample_bot(&store, "s");
        store.append_history(&bot.id, "c1", "hi", "hello").unwrap();
        store.append_history(&bot.id, "c2", "yo", "hey").unwrap();
        assert_eq!(store.history_count(&bot.id, "c1").unwrap(), 1);
        assert_eq!(store.history_count(&bot.id, "c2").unwrap(), 1);
    }

    #[test]
    fn deleting_bot_cascades() {
        let store = test_store();
        let bot = sample_bot(&store, "cascade");
        store.insert_command(&bot.id, &sample_command("x")).unwrap();
        store.append_history(&bot.id, "c1", "u", "a").unwrap();

        store.delete_bot(&bot.id).unwrap();
        assert!(store.list_commands(&bot.id).unwrap().is_empty());
        assert_eq!(store.history_count(&bot.id, "c1").unwrap(), 0);
    }

    #[test]
    fn referenced_database_cannot_be_deleted() {
        let store = test_store();
        let kb = store
            .insert_database("facts", DbKind::Text, None, "the sky is blue")
            .unwrap();
        let bot = store
            .insert_bot(&NewBot {
                name: "kb-bot".to_string(),
                tag: None,
                token: "t".to_string(),
                api_url: "u".to_string(),
                api_key: "k".to_string(),
                ai_model: "m".to_string(),
                system_prompt: None,
                database_id: Some(kb.id.clone()),
                memory_enabled: false,
                memory_messages_count: 0,
            })
            .unwrap();

        let err = store.delete_database(&kb.id).unwrap_err();
        assert!(matches!(err, StoreError::DatabaseInUse { .. }));
        // Row must remain.
        assert!(store.get_database(&kb.id).is_ok());

        // After the bot stops referencing it, delete succeeds.
        store
            .update_bot(
                &bot.id,
                &BotPatch {
                    database_id: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        store.delete_database(&kb.id).unwrap();
    }

    #[test]
    fn json_database_content_validated() {
        let store = test_store();
        let err = store
            .insert_database("bad", DbKind::Json, None, "{oops")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidJson(_)));
        store
            .insert_database("good", DbKind::Json, None, r#"{"a":1}"#)
            .unwrap();
    }

    #[test]
    fn reset_all_running_clears_flags() {
        let store = test_store();
        let bot = sample_bot(&store, "r");
        store.set_running(&bot.id, true).unwrap();
        assert_eq!(store.bots_marked_running().unwrap(), vec![bot.id.clone()]);
        assert_eq!(store.reset_all_running().unwrap(), 1);
        assert!(store.bots_marked_running().unwrap().is_empty());
    }

    #[test]
    fn settings_upsert() {
        let store = test_store();
        store.set_setting("support_ai_model", "gpt-4o").unwrap();
        store.set_setting("support_ai_model", "gpt-4o-mini").unwrap();
        assert_eq!(
            store.get_setting("support_ai_model").unwrap().as_deref(),
            Some("gpt-4o-mini")
        );
    }
}
