use rusqlite::{Connection, Result};
use tracing::debug;

/// Initialise all tables and indexes. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    create_users_table(conn)?;
    create_bots_table(conn)?;
    create_databases_table(conn)?;
    create_commands_table(conn)?;
    create_history_table(conn)?;
    create_settings_table(conn)?;
    run_column_migrations(conn)?;
    Ok(())
}

fn create_users_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );",
    )
}

fn create_bots_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bots (
            id                    TEXT PRIMARY KEY,
            name                  TEXT NOT NULL,
            tag                   TEXT,
            token                 TEXT NOT NULL,
            api_url               TEXT NOT NULL,
            api_key               TEXT NOT NULL,
            ai_model              TEXT NOT NULL,
            system_prompt         TEXT,
            database_id           TEXT REFERENCES databases(id),
            telegram_username     TEXT,
            telegram_first_name   TEXT,
            telegram_bot_id       INTEGER,
            is_active             INTEGER NOT NULL DEFAULT 0,
            is_running            INTEGER NOT NULL DEFAULT 0,
            memory_enabled        INTEGER NOT NULL DEFAULT 0,
            memory_messages_count INTEGER NOT NULL DEFAULT 10,
            created_at            TEXT NOT NULL,
            updated_at            TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bots_flags
            ON bots(is_active, is_running);",
    )
}

fn create_databases_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS databases (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            type        TEXT NOT NULL DEFAULT 'text',
            description TEXT,
            content     TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )
}

fn create_commands_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bot_commands (
            id                      TEXT PRIMARY KEY,
            bot_id                  TEXT NOT NULL REFERENCES bots(id) ON DELETE CASCADE,
            name                    TEXT NOT NULL,
            description             TEXT,
            json_code               TEXT NOT NULL,
            is_active               INTEGER NOT NULL DEFAULT 1,
            is_multi_command        INTEGER NOT NULL DEFAULT 0,
            parent_multi_command_id TEXT,
            allow_external_commands INTEGER NOT NULL DEFAULT 0,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL,
            UNIQUE(bot_id, name)
        );
        CREATE INDEX IF NOT EXISTS idx_commands_lookup
            ON bot_commands(bot_id, name, is_active);",
    )
}

fn create_history_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chat_history (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            bot_id       TEXT NOT NULL REFERENCES bots(id) ON DELETE CASCADE,
            chat_id      TEXT NOT NULL,
            user_message TEXT NOT NULL,
            ai_response  TEXT NOT NULL,
            timestamp    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_history_chat
            ON chat_history(bot_id, chat_id, timestamp DESC);",
    )
}

fn create_settings_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS settings (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

/// Columns added after the initial schema. Each ALTER is guarded: SQLite has
/// no ADD COLUMN IF NOT EXISTS, so "duplicate column name" errors are ignored.
fn run_column_migrations(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "bots", "tag", "TEXT");
    add_column_if_missing(conn, "bots", "memory_enabled", "INTEGER NOT NULL DEFAULT 0");
    add_column_if_missing(
        conn,
        "bots",
        "memory_messages_count",
        "INTEGER NOT NULL DEFAULT 10",
    );
    add_column_if_missing(
        conn,
        "bot_commands",
        "allow_external_commands",
        "INTEGER NOT NULL DEFAULT 0",
    );
    Ok(())
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    if let Err(e) = conn.execute(&sql, []) {
        let msg = e.to_string();
        if msg.contains("duplicate column name") {
            debug!(table, column, "column already present");
        } else {
            tracing::warn!(table, column, error = %msg, "column migration failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn duplicate_column_is_ignored() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        // Second add of an existing column must not panic or error out.
        add_column_if_missing(&conn, "bots", "tag", "TEXT");
    }
}
