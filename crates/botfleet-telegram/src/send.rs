//! Sending and editing helpers shared by the pipeline and command executor.

use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId,
};
use teloxide::ApiError;
use tracing::{debug, info};

use crate::action::Button;

/// Build an inline keyboard from parsed menu buttons.
pub fn inline_keyboard(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Build a reply keyboard. Always resized; one-time is per command config.
pub fn reply_keyboard(rows: &[Vec<String>], one_time: bool) -> KeyboardMarkup {
    let mut markup = KeyboardMarkup::new(
        rows.iter()
            .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>()),
    )
    .resize_keyboard();
    if one_time {
        markup = markup.one_time_keyboard();
    }
    markup
}

/// Send `text`, or edit message `edit` in place when given.
///
/// Edit failure ladder:
/// - "message is not modified" — nothing to do, logged at INFO;
/// - message gone or uneditable — fall back to sending a new message;
/// - anything else propagates to the caller.
pub async fn send_or_edit(
    bot: &Bot,
    chat_id: ChatId,
    edit: Option<MessageId>,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<(), teloxide::RequestError> {
    if let Some(message_id) = edit {
        let mut req = bot.edit_message_text(chat_id, message_id, text);
        if let Some(kb) = keyboard.clone() {
            req = req.reply_markup(kb);
        }
        match req.await {
            Ok(_) => return Ok(()),
            Err(teloxide::RequestError::Api(ApiError::MessageNotModified)) => {
                info!(%chat_id, "edit skipped: content unchanged");
                return Ok(());
            }
            Err(teloxide::RequestError::Api(
                ApiError::MessageToEditNotFound | ApiError::MessageCantBeEdited,
            )) => {
                debug!(%chat_id, "edit target gone, sending a new message");
                // fall through to send
            }
            Err(e) => return Err(e),
        }
    }

    let mut req = bot.send_message(chat_id, text);
    if let Some(kb) = keyboard {
        req = req.reply_markup(kb);
    }
    req.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_keyboard_preserves_rows() {
        let rows = vec![
            vec![Button {
                text: "A".to_string(),
                callback_data: "a".to_string(),
            }],
            vec![
                Button {
                    text: "B".to_string(),
                    callback_data: "b".to_string(),
                },
                Button {
                    text: "C".to_string(),
                    callback_data: "c".to_string(),
                },
            ],
        ];
        let markup = inline_keyboard(&rows);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1].len(), 2);
    }

    #[test]
    fn reply_keyboard_is_resized() {
        let markup = reply_keyboard(&[vec!["Да".to_string()]], false);
        assert_eq!(markup.keyboard.len(), 1);
    }
}
