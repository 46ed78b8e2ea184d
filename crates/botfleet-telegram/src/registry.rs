//! Active multi-command context per `(bot, chat)`.
//!
//! Deliberately in-memory only: a process restart drops every chat back to
//! the top level. Cleared for a whole bot on worker stop.

use dashmap::DashMap;

/// Concurrent map `(bot_id, chat_id) → active multi-command id`.
pub struct ContextRegistry {
    entries: DashMap<(String, String), String>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, bot_id: &str, chat_id: &str) -> Option<String> {
        self.entries
            .get(&(bot_id.to_string(), chat_id.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn set(&self, bot_id: &str, chat_id: &str, command_id: &str) {
        self.entries.insert(
            (bot_id.to_string(), chat_id.to_string()),
            command_id.to_string(),
        );
    }

    pub fn delete(&self, bot_id: &str, chat_id: &str) {
        self.entries
            .remove(&(bot_id.to_string(), chat_id.to_string()));
    }

    /// Drop every chat context of one bot (worker stop).
    pub fn clear_by_bot(&self, bot_id: &str) {
        self.entries.retain(|(b, _), _| b != bot_id);
    }

    /// Drop every chat currently inside the given multi-command.
    /// Returns how many entries were cleared.
    pub fn clear_by_command(&self, bot_id: &str, command_id: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|(b, _), cmd| !(b == bot_id && cmd == command_id));
        before - self.entries.len()
    }

    /// Drop everything (process shutdown).
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let reg = ContextRegistry::new();
        assert!(reg.get("b1", "c1").is_none());

        reg.set("b1", "c1", "cmd-1");
        assert_eq!(reg.get("b1", "c1").as_deref(), Some("cmd-1"));

        // Re-set overwrites.
        reg.set("b1", "c1", "cmd-2");
        assert_eq!(reg.get("b1", "c1").as_deref(), Some("cmd-2"));

        reg.delete("b1", "c1");
        assert!(reg.get("b1", "c1").is_none());
    }

    #[test]
    fn scoped_per_bot_and_chat() {
        let reg = ContextRegistry::new();
        reg.set("b1", "c1", "x");
        reg.set("b1", "c2", "x");
        reg.set("b2", "c1", "y");

        reg.clear_by_bot("b1");
        assert!(reg.get("b1", "c1").is_none());
        assert!(reg.get("b1", "c2").is_none());
        assert_eq!(reg.get("b2", "c1").as_deref(), Some("y"));
    }

    #[test]
    fn clear_by_command_returns_count() {
        let reg = ContextRegistry::new();
        reg.set("b1", "c1", "mc");
        reg.set("b1", "c2", "mc");
        reg.set("b1", "c3", "other");
        reg.set("b2", "c1", "mc");

        // Only b1 chats inside `mc` are cleared.
        assert_eq!(reg.clear_by_command("b1", "mc"), 2);
        assert!(reg.get("b1", "c1").is_none());
        assert_eq!(reg.get("b1", "c3").as_deref(), Some("other"));
        assert_eq!(reg.get("b2", "c1").as_deref(), Some("mc"));

        assert_eq!(reg.clear_by_command("b1", "mc"), 0);
    }

    #[test]
    fn clear_all_empties() {
        let reg = ContextRegistry::new();
        reg.set("b1", "c1", "x");
        reg.set("b2", "c2", "y");
        reg.clear_all();
        assert!(reg.is_empty());
    }
}
