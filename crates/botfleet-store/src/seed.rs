//! First-start seed data: admin user, example knowledge bases, support-chat
//! settings. Every insert is an upsert or insert-or-ignore, so re-running on
//! startup is harmless.

use tracing::info;

use crate::error::Result;
use crate::store::Store;
use crate::types::DbKind;

const ADMIN_EMAIL: &str = "admin@admin.com";
const ADMIN_PASSWORD: &str = "admin123";

const SUPPORT_DEFAULTS: [(&str, &str); 4] = [
    ("support_ai_api_url", "https://api.openai.com"),
    ("support_ai_api_key", ""),
    ("support_ai_model", "gpt-4o-mini"),
    (
        "support_ai_system_prompt",
        "Ты — помощник службы поддержки панели управления ботами. Отвечай кратко и по делу.",
    ),
];

/// Populate initial rows on a fresh database.
pub fn seed(store: &Store) -> Result<()> {
    if store.find_user_by_email(ADMIN_EMAIL)?.is_none() {
        let hash = bcrypt::hash(ADMIN_PASSWORD, bcrypt::DEFAULT_COST)
            .map_err(|e| crate::error::StoreError::Hash(e.to_string()))?;
        store.insert_user(ADMIN_EMAIL, &hash)?;
        info!(email = ADMIN_EMAIL, "seeded admin user");
    }

    if store.list_databases()?.is_empty() {
        store.insert_database(
            "Пример текстовой базы",
            DbKind::Text,
            Some("Пример базы знаний в текстовом формате"),
            "Компания работает с 9:00 до 18:00 по будням.\nДоставка по городу занимает 1-2 дня.",
        )?;
        store.insert_database(
            "Пример JSON базы",
            DbKind::Json,
            Some("Пример базы знаний в формате JSON"),
            r#"{"hours":"9:00-18:00","delivery_days":2,"phone":"+7 900 000-00-00"}"#,
        )?;
        info!("seeded example knowledge databases");
    }

    for (key, value) in SUPPORT_DEFAULTS {
        if store.get_setting(key)?.is_none() {
            store.set_setting(key, value)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn seed_is_idempotent() {
        let store = Store::new(Connection::open_in_memory().unwrap()).unwrap();
        seed(&store).unwrap();
        seed(&store).unwrap();

        assert!(store.find_user_by_email(ADMIN_EMAIL).unwrap().is_some());
        assert_eq!(store.list_databases().unwrap().len(), 2);
        assert!(store
            .get_setting("support_ai_system_prompt")
            .unwrap()
            .is_some());
    }

    #[test]
    fn seeded_admin_password_verifies() {
        let store = Store::new(Connection::open_in_memory().unwrap()).unwrap();
        seed(&store).unwrap();
        let user = store.find_user_by_email(ADMIN_EMAIL).unwrap().unwrap();
        assert!(bcrypt::verify(ADMIN_PASSWORD, &user.password_hash).unwrap());
    }
}
