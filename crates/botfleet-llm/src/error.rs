use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty response from provider")]
    Empty,

    #[error("parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Human-readable Russian message shown to the Telegram user when a call
    /// fails. Operators get the structured error through the log buffer.
    pub fn user_facing_text(&self) -> String {
        match self {
            LlmError::Api { status, .. } => {
                format!("Ошибка AI сервиса (код {status}). Попробуйте позже.")
            }
            LlmError::Http(_) => {
                "Не удалось подключиться к AI сервису. Проверьте настройки подключения.".to_string()
            }
            LlmError::Empty => "Получен пустой ответ от AI сервиса.".to_string(),
            LlmError::Parse(_) => "Получен некорректный ответ от AI сервиса.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_names_status_code() {
        let e = LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(e.user_facing_text().contains("503"));
    }

    #[test]
    fn empty_response_text_is_exact() {
        assert_eq!(
            LlmError::Empty.user_facing_text(),
            "Получен пустой ответ от AI сервиса."
        );
    }
}
