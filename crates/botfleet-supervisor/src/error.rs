use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("store error: {0}")]
    Store(#[from] botfleet_store::StoreError),

    #[error("telegram error: {0}")]
    Telegram(String),
}

impl From<teloxide::RequestError> for SupervisorError {
    fn from(e: teloxide::RequestError) -> Self {
        SupervisorError::Telegram(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
