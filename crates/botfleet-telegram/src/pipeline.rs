//! Per-message orchestration: fresh config read, health check, command
//! dispatch or memory-aware LLM reply, history persistence.

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use tracing::{debug, warn};

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_llm::{ChatMessage, Knowledge, KnowledgeKind, LlmTarget};
use botfleet_store::types::{BotRow, CommandRow, DbKind};
use botfleet_store::StoreError;

use crate::context::{TelegramAppContext, WorkerBotId};
use crate::engine;
use crate::error::PipelineError;
use crate::execute::execute_command;

pub const NON_TEXT_REPLY: &str = "Извините, я работаю только с текстовыми сообщениями.";
pub const GENERIC_ERROR_REPLY: &str =
    "Извините, произошла ошибка при обработке вашего сообщения.";

/// Pause between the natural lead-in and the scripted command, so the two
/// messages read as a conversation rather than a burst.
const ACK_PAUSE: Duration = Duration::from_millis(500);

/// Telegram text-message handler registered in each worker's Dispatcher.
pub async fn handle_message<C: TelegramAppContext + 'static>(
    bot: Bot,
    msg: Message,
    ctx: Arc<C>,
    worker: WorkerBotId,
) -> ResponseResult<()> {
    // Ignore messages from other bots.
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }

    // Always re-read the row: config may have been hot-reloaded since the
    // worker started.
    let row = match fresh_row(ctx.as_ref(), &worker.0) {
        Some(row) => row,
        None => return Ok(()),
    };

    let chat_id = msg.chat.id;
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => {
            let _ = bot.send_message(chat_id, NON_TEXT_REPLY).await;
            return Ok(());
        }
    };

    if let Err(e) = process_text(&bot, ctx.as_ref(), &row, chat_id, &text).await {
        ctx.logs().append(
            LogLevel::Error,
            LogCategory::Bot,
            format!("Message processing failed for bot '{}': {e}", row.name),
            None,
        );
        let _ = bot.send_message(chat_id, GENERIC_ERROR_REPLY).await;
    }

    Ok(())
}

/// Inline-button callback handler. Matches by exact command name and edits
/// the originating message in place.
pub async fn handle_callback<C: TelegramAppContext + 'static>(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<C>,
    worker: WorkerBotId,
) -> ResponseResult<()> {
    // Telegram requires answering the callback to clear the client spinner,
    // before anything else happens in the chat.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(error = %e, "failed to answer callback query");
    }

    let row = match fresh_row(ctx.as_ref(), &worker.0) {
        Some(row) => row,
        None => return Ok(()),
    };

    let data = match q.data.as_deref() {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => return Ok(()),
    };
    let (chat_id, message_id) = match q.message.as_ref() {
        Some(m) => (m.chat().id, m.id()),
        None => return Ok(()),
    };

    let chat_key = chat_id.0.to_string();
    let active_mc = active_multi_command(ctx.as_ref(), &row.id, &chat_key);
    let visible = match ctx.store().active_commands(&row.id) {
        Ok(cmds) => engine::visible_commands(cmds, active_mc.as_ref()),
        Err(e) => {
            warn!(bot_id = %row.id, error = %e, "failed to load commands for callback");
            return Ok(());
        }
    };

    match visible.iter().find(|c| c.name == data) {
        Some(cmd) => {
            // Reply keyboards cannot be edited in; the executor handles that.
            execute_command(&bot, ctx.as_ref(), &row, cmd, chat_id, Some(message_id)).await;
        }
        None => {
            debug!(bot_id = %row.id, callback = %data, "callback matched no visible command");
        }
    }

    Ok(())
}

/// Steps 4–6 of the text pipeline: command dispatch, else memory-aware reply.
async fn process_text<C: TelegramAppContext>(
    bot: &Bot,
    ctx: &C,
    row: &BotRow,
    chat_id: ChatId,
    text: &str,
) -> Result<(), PipelineError> {
    let chat_key = chat_id.0.to_string();
    let active_mc = active_multi_command(ctx, &row.id, &chat_key);
    let visible = engine::visible_commands(ctx.store().active_commands(&row.id)?, active_mc.as_ref());

    if let Some(cmd) = engine::classify_intent(ctx, row, &visible, text).await {
        // Conversational lead-in before the scripted UI appears. Containers
        // go straight to their welcome message.
        if !cmd.is_multi_command {
            if let Some(ack) = engine::natural_ack(ctx, row, text).await {
                bot.send_message(chat_id, ack).await?;
                tokio::time::sleep(ACK_PAUSE).await;
            }
        }
        execute_command(bot, ctx, row, cmd, chat_id, None).await;
        return Ok(());
    }

    // No command intent: memory-aware LLM reply.
    let messages = build_messages(ctx, row, &chat_key, text)?;
    let target = LlmTarget {
        api_url: row.api_url.clone(),
        api_key: row.api_key.clone(),
        model: row.ai_model.clone(),
    };
    let system = compose_system(ctx, row);

    let reply = match ctx.llm().complete(&target, system.as_deref(), &messages).await {
        Ok(reply) => reply,
        Err(e) => {
            // The user still gets an answer; operators get the real error.
            ctx.logs().append(
                LogLevel::Error,
                LogCategory::Bot,
                format!("LLM call failed for bot '{}': {e}", row.name),
                None,
            );
            e.user_facing_text()
        }
    };

    bot.send_message(chat_id, &reply).await?;
    ctx.store()
        .append_history(&row.id, &chat_key, text, &reply)?;
    Ok(())
}

/// Steps 1–2: fresh row + supervisor health check. `None` drops the message.
fn fresh_row<C: TelegramAppContext>(ctx: &C, bot_id: &str) -> Option<BotRow> {
    let row = match ctx.store().get_bot(bot_id) {
        Ok(row) => row,
        Err(e) => {
            ctx.logs().append(
                LogLevel::Warning,
                LogCategory::Bot,
                format!("Dropping message for unknown bot {bot_id}: {e}"),
                None,
            );
            return None;
        }
    };

    if !row.is_running || !ctx.worker_active(bot_id) {
        ctx.logs().append(
            LogLevel::Warning,
            LogCategory::Bot,
            format!("Dropping message for inactive bot '{}'", row.name),
            None,
        );
        return None;
    }
    Some(row)
}

/// Resolve the chat's active multi-command, dropping a stale registry entry
/// whose command no longer exists.
fn active_multi_command<C: TelegramAppContext>(
    ctx: &C,
    bot_id: &str,
    chat_key: &str,
) -> Option<CommandRow> {
    let cmd_id = ctx.registry().get(bot_id, chat_key)?;
    match ctx.store().get_command(bot_id, &cmd_id) {
        Ok(cmd) if cmd.is_active => Some(cmd),
        Ok(_) | Err(StoreError::NotFound { .. }) => {
            ctx.registry().delete(bot_id, chat_key);
            None
        }
        Err(e) => {
            warn!(bot_id, error = %e, "multi-command lookup failed");
            None
        }
    }
}

/// Rolling history interleaved as user/assistant pairs, oldest first, then
/// the current message. Memory depth is clamped to [0, 50].
fn build_messages<C: TelegramAppContext>(
    ctx: &C,
    row: &BotRow,
    chat_key: &str,
    text: &str,
) -> Result<Vec<ChatMessage>, PipelineError> {
    let mut messages = Vec::new();
    if row.memory_enabled {
        let depth = row.memory_messages_count.clamp(0, botfleet_store::store::MEMORY_MAX);
        if depth > 0 {
            let mut recent = ctx.store().recent_exchanges(&row.id, chat_key, depth)?;
            recent.reverse(); // newest-first → chronological
            for entry in recent {
                messages.push(ChatMessage::user(entry.user_message));
                messages.push(ChatMessage::assistant(entry.ai_response));
            }
        }
    }
    messages.push(ChatMessage::user(text));
    Ok(messages)
}

fn compose_system<C: TelegramAppContext>(ctx: &C, row: &BotRow) -> Option<String> {
    let knowledge = row.database_id.as_deref().and_then(|db_id| {
        match ctx.store().get_database(db_id) {
            Ok(db) => Some(Knowledge {
                kind: match db.kind {
                    DbKind::Text => KnowledgeKind::Text,
                    DbKind::Json => KnowledgeKind::Json,
                },
                content: db.content,
            }),
            Err(e) => {
                warn!(bot_id = %row.id, database_id = db_id, error = %e, "knowledge base lookup failed");
                None
            }
        }
    });
    botfleet_llm::prompt::compose_system_prompt(row.system_prompt.as_deref(), knowledge.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use botfleet_core::logbuf::LogBuffer;
    use botfleet_core::stats::RequestStats;
    use botfleet_llm::LlmClient;
    use botfleet_store::types::NewBot;
    use botfleet_store::Store;
    use crate::registry::ContextRegistry;

    struct TestCtx {
        store: Store,
        llm: LlmClient,
        registry: ContextRegistry,
        logs: LogBuffer,
        stats: Arc<RequestStats>,
    }

    impl TestCtx {
        fn new() -> Self {
            let stats = Arc::new(RequestStats::new());
            Self {
                store: Store::new(rusqlite_mem()).unwrap(),
                llm: LlmClient::new(stats.clone()),
                registry: ContextRegistry::new(),
                logs: LogBuffer::new(),
                stats,
            }
        }
    }

    fn rusqlite_mem() -> rusqlite::Connection {
        rusqlite::Connection::open_in_memory().unwrap()
    }

    impl TelegramAppContext for TestCtx {
        fn store(&self) -> &Store {
            &self.store
        }
        fn llm(&self) -> &LlmClient {
            &self.llm
        }
        fn registry(&self) -> &ContextRegistry {
            &self.registry
        }
        fn logs(&self) -> &LogBuffer {
            &self.logs
        }
        fn stats(&self) -> &RequestStats {
            &self.stats
        }
        fn worker_active(&self, _bot_id: &str) -> bool {
            true
        }
    }

    fn seed_bot(ctx: &TestCtx, memory_count: i64) -> BotRow {
        ctx.store
            .insert_bot(&NewBot {
                name: "t".to_string(),
                tag: None,
                token: "123:abc".to_string(),
                api_url: "https://api.openai.com".to_string(),
                api_key: "k".to_string(),
                ai_model: "gpt-4o".to_string(),
                system_prompt: Some("sys".to_string()),
                database_id: None,
                memory_enabled: true,
                memory_messages_count: memory_count,
            })
            .unwrap()
    }

    #[test]
    fn messages_interleave_history_chronologically() {
        let ctx = TestCtx::new();
        let row = seed_bot(&ctx, 2);
        ctx.store.append_history(&row.id, "c1", "hi", "hello").unwrap();
        ctx.store
            .append_history(&row.id, "c1", "how are you", "fine")
            .unwrap();

        let msgs = build_messages(&ctx, &row, "c1", "tell me a joke").unwrap();
        let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["hi", "hello", "how are you", "fine", "tell me a joke"]
        );
    }

    #[test]
    fn memory_depth_limits_history() {
        let ctx = TestCtx::new();
        let row = seed_bot(&ctx, 1);
        ctx.store.append_history(&row.id, "c1", "old", "old-r").unwrap();
        ctx.store.append_history(&row.id, "c1", "new", "new-r").unwrap();

        let msgs = build_messages(&ctx, &row, "c1", "q").unwrap();
        let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
        // Only the newest exchange plus the current message.
        assert_eq!(contents, vec!["new", "new-r", "q"]);
    }

    #[test]
    fn memory_disabled_sends_only_current() {
        let ctx = TestCtx::new();
        let mut row = seed_bot(&ctx, 10);
        row.memory_enabled = false;
        ctx.store.append_history(&row.id, "c1", "hi", "yo").unwrap();

        let msgs = build_messages(&ctx, &row, "c1", "q").unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "q");
    }

    #[test]
    fn stale_registry_entry_is_dropped() {
        let ctx = TestCtx::new();
        let row = seed_bot(&ctx, 0);
        ctx.registry.set(&row.id, "c1", "gone-command");
        assert!(active_multi_command(&ctx, &row.id, "c1").is_none());
        assert!(ctx.registry.get(&row.id, "c1").is_none());
    }
}
