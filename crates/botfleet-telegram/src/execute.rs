//! Execution of a matched command against Telegram.

use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::warn;

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_store::types::{BotRow, CommandRow};

use crate::action::CommandAction;
use crate::context::TelegramAppContext;
use crate::send::{inline_keyboard, reply_keyboard, send_or_edit};

/// Shown to the chat when a command cannot be executed.
pub const COMMAND_ERROR_REPLY: &str = "Ошибка выполнения команды.";

const DEFAULT_WELCOME: &str = "Добро пожаловать! Выберите действие.";
const DEFAULT_MENU_TITLE: &str = "Меню";

/// Execute `cmd` in `chat_id`. When `edit` carries the originating message id
/// (callback path) the reply edits in place; reply keyboards always send.
///
/// Never propagates an error: failures are logged and the chat is told the
/// command failed.
pub async fn execute_command<C: TelegramAppContext>(
    bot: &Bot,
    ctx: &C,
    bot_row: &BotRow,
    cmd: &CommandRow,
    chat_id: ChatId,
    edit: Option<MessageId>,
) {
    if let Err(e) = run(bot, ctx, bot_row, cmd, chat_id, edit).await {
        warn!(bot_id = %bot_row.id, command = %cmd.name, error = %e, "command execution failed");
        ctx.logs().append(
            LogLevel::Error,
            LogCategory::Bot,
            format!("Command '{}' failed for bot '{}': {e}", cmd.name, bot_row.name),
            None,
        );
        let _ = bot.send_message(chat_id, COMMAND_ERROR_REPLY).await;
    }
}

async fn run<C: TelegramAppContext>(
    bot: &Bot,
    ctx: &C,
    bot_row: &BotRow,
    cmd: &CommandRow,
    chat_id: ChatId,
    edit: Option<MessageId>,
) -> Result<(), crate::error::PipelineError> {
    let action = CommandAction::parse(&cmd.json_code)?;

    match action {
        CommandAction::MultiCommand { welcome } => {
            // Entering the container narrows command visibility for this chat.
            ctx.registry()
                .set(&bot_row.id, &chat_id.0.to_string(), &cmd.id);
            let text = welcome
                .or_else(|| cmd.description.clone())
                .unwrap_or_else(|| DEFAULT_WELCOME.to_string());
            send_or_edit(bot, chat_id, edit, &text, None).await?;
        }
        CommandAction::Menu { text, buttons } => {
            let text = text
                .or_else(|| cmd.description.clone())
                .unwrap_or_else(|| DEFAULT_MENU_TITLE.to_string());
            send_or_edit(bot, chat_id, edit, &text, Some(inline_keyboard(&buttons))).await?;
        }
        CommandAction::Keyboard { rows, one_time } => {
            // Reply keyboards cannot be attached via edit.
            let text = cmd
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_MENU_TITLE.to_string());
            bot.send_message(chat_id, text)
                .reply_markup(reply_keyboard(&rows, one_time))
                .await?;
        }
        CommandAction::Message { text } => {
            let text = text.unwrap_or_else(|| pretty(&cmd.json_code));
            send_or_edit(bot, chat_id, edit, &text, None).await?;
        }
        CommandAction::Other { text, raw } => {
            let text = text.unwrap_or_else(|| {
                serde_json::to_string_pretty(&raw).unwrap_or_else(|_| cmd.json_code.clone())
            });
            send_or_edit(bot, chat_id, edit, &text, None).await?;
        }
    }
    Ok(())
}

fn pretty(json_code: &str) -> String {
    serde_json::from_str::<serde_json::Value>(json_code)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| json_code.to_string())
}
