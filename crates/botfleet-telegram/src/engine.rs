//! Command visibility and LLM intent classification.

use botfleet_llm::{ChatMessage, LlmTarget};
use botfleet_store::types::{BotRow, CommandRow};
use tracing::{debug, warn};

use crate::context::TelegramAppContext;

/// Fixed system prompt for the intent probe — deliberately not the bot's own
/// persona, so classification stays terse.
pub const INTENT_SYSTEM_PROMPT: &str =
    "Ты помощник для определения команд. Отвечай кратко и точно.";

/// The literal the model answers when no command matches.
pub const NO_COMMAND: &str = "НЕТ";

/// Commands visible to a chat given its active multi-command (if any).
///
/// - No active multi-command: every active command, including containers.
/// - Active `M` with `allow_external_commands`: nested-in-M plus top-level.
/// - Active `M` without: nested-in-M only.
pub fn visible_commands(
    all_active: Vec<CommandRow>,
    active_mc: Option<&CommandRow>,
) -> Vec<CommandRow> {
    match active_mc {
        None => all_active,
        Some(mc) if mc.allow_external_commands => all_active
            .into_iter()
            .filter(|c| {
                c.parent_multi_command_id.as_deref() == Some(mc.id.as_str())
                    || c.parent_multi_command_id.is_none()
            })
            .collect(),
        Some(mc) => all_active
            .into_iter()
            .filter(|c| c.parent_multi_command_id.as_deref() == Some(mc.id.as_str()))
            .collect(),
    }
}

/// Build the intent-probe prompt listing the visible commands.
pub fn build_intent_prompt(visible: &[CommandRow], user_text: &str) -> String {
    let mut prompt = String::from(
        "Определи, просит ли пользователь выполнить одну из команд.\n\nДоступные команды:\n",
    );
    for cmd in visible {
        prompt.push_str("- ");
        prompt.push_str(&cmd.name);
        if let Some(desc) = cmd.description.as_deref() {
            if !desc.is_empty() {
                prompt.push_str(": ");
                prompt.push_str(desc);
            }
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nСообщение пользователя: \"{user_text}\"\n\nЕсли сообщение — запрос одной из команд, ответь только её названием. Если нет, ответь {NO_COMMAND}."
    ));
    prompt
}

/// Match the probe's answer against the visible set.
///
/// A command matches when its name appears case-insensitively in the response
/// and the response does not contain the `НЕТ` sentinel. Ties go to the first
/// match in visibility order.
pub fn match_intent<'a>(response: &str, visible: &'a [CommandRow]) -> Option<&'a CommandRow> {
    let upper = response.to_uppercase();
    if upper.contains(NO_COMMAND) {
        return None;
    }
    let lower = response.to_lowercase();
    visible
        .iter()
        .find(|cmd| lower.contains(&cmd.name.to_lowercase()))
}

/// Run the intent probe against the bot's own LLM.
///
/// Classification failures are soft: on any provider error the message falls
/// through to the normal reply path.
pub async fn classify_intent<'a, C: TelegramAppContext>(
    ctx: &C,
    bot: &BotRow,
    visible: &'a [CommandRow],
    user_text: &str,
) -> Option<&'a CommandRow> {
    if visible.is_empty() {
        return None;
    }

    let target = LlmTarget {
        api_url: bot.api_url.clone(),
        api_key: bot.api_key.clone(),
        model: bot.ai_model.clone(),
    };
    let probe = build_intent_prompt(visible, user_text);
    let messages = [ChatMessage::user(probe)];

    match ctx
        .llm()
        .complete(&target, Some(INTENT_SYSTEM_PROMPT), &messages)
        .await
    {
        Ok(response) => {
            debug!(bot_id = %bot.id, %response, "intent probe answer");
            match_intent(&response, visible)
        }
        Err(e) => {
            warn!(bot_id = %bot.id, error = %e, "intent probe failed, falling through");
            None
        }
    }
}

/// Short conversational lead-in sent before a scripted command executes.
pub const ACK_SYSTEM_PROMPT: &str = "Пользователь запросил команду. Подтверди запрос естественно, \
     одним-двумя предложениями. Не перечисляй пункты меню.";

/// Generate the pre-action natural reply. `None` on any provider error —
/// the command still executes without a lead-in.
pub async fn natural_ack<C: TelegramAppContext>(
    ctx: &C,
    bot: &BotRow,
    user_text: &str,
) -> Option<String> {
    let target = LlmTarget {
        api_url: bot.api_url.clone(),
        api_key: bot.api_key.clone(),
        model: bot.ai_model.clone(),
    };
    let messages = [ChatMessage::user(user_text)];
    match ctx
        .llm()
        .complete(&target, Some(ACK_SYSTEM_PROMPT), &messages)
        .await
    {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(bot_id = %bot.id, error = %e, "pre-action reply failed, executing anyway");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(id: &str, name: &str, parent: Option<&str>) -> CommandRow {
        CommandRow {
            id: id.to_string(),
            bot_id: "b1".to_string(),
            name: name.to_string(),
            description: Some(format!("{name} description")),
            json_code: r#"{"type":"message","text":"x"}"#.to_string(),
            is_active: true,
            is_multi_command: parent.is_none() && name.starts_with("mc"),
            parent_multi_command_id: parent.map(str::to_string),
            allow_external_commands: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn mc(id: &str, name: &str, allow_external: bool) -> CommandRow {
        let mut c = cmd(id, name, None);
        c.is_multi_command = true;
        c.allow_external_commands = allow_external;
        c
    }

    #[test]
    fn all_visible_without_active_context() {
        let cmds = vec![cmd("1", "top", None), mc("2", "mc_menu", false), cmd("3", "inner", Some("2"))];
        let visible = visible_commands(cmds, None);
        assert_eq!(visible.len(), 3);
    }

    #[test]
    fn external_disallowed_hides_top_level() {
        let container = mc("2", "mc_menu", false);
        let cmds = vec![cmd("1", "other", None), container.clone(), cmd("3", "inner", Some("2"))];
        let visible = visible_commands(cmds, Some(&container));
        let names: Vec<_> = visible.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["inner"]);
    }

    #[test]
    fn external_allowed_shows_nested_and_top_level() {
        let container = mc("2", "mc_menu", true);
        let cmds = vec![
            cmd("1", "other", None),
            container.clone(),
            cmd("3", "inner", Some("2")),
            cmd("4", "foreign", Some("9")),
        ];
        let visible = visible_commands(cmds, Some(&container));
        let names: Vec<_> = visible.iter().map(|c| c.name.as_str()).collect();
        // Nested-in-other-container commands stay hidden.
        assert_eq!(names, vec!["other", "mc_menu", "inner"]);
    }

    #[test]
    fn intent_match_is_case_insensitive() {
        let cmds = vec![cmd("1", "open_menu", None)];
        assert!(match_intent("OPEN_MENU", &cmds).is_some());
        assert!(match_intent("команда open_menu подходит", &cmds).is_some());
    }

    #[test]
    fn no_sentinel_blocks_matches() {
        let cmds = vec![cmd("1", "open_menu", None)];
        assert!(match_intent("НЕТ", &cmds).is_none());
        // Sentinel wins even when a name is also present.
        assert!(match_intent("НЕТ, open_menu не подходит", &cmds).is_none());
        assert!(match_intent("нет", &cmds).is_none());
    }

    #[test]
    fn first_match_wins_ties() {
        let cmds = vec![cmd("1", "menu", None), cmd("2", "menu_extra", None)];
        let hit = match_intent("menu_extra", &cmds).unwrap();
        // "menu" is a substring of the response, and comes first in
        // visibility order.
        assert_eq!(hit.id, "1");
    }

    #[test]
    fn probe_prompt_lists_commands_and_sentinel() {
        let cmds = vec![cmd("1", "open_menu", None)];
        let prompt = build_intent_prompt(&cmds, "покажи меню");
        assert!(prompt.contains("open_menu"));
        assert!(prompt.contains("open_menu description"));
        assert!(prompt.contains("покажи меню"));
        assert!(prompt.contains(NO_COMMAND));
    }
}
