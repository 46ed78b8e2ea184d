use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("command name already exists for this bot: {name}")]
    NameTaken { name: String },

    #[error("database is referenced by at least one bot: {id}")]
    DatabaseInUse { id: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
