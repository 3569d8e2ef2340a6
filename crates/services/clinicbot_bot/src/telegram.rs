//! Telegram adapter: converts teloxide updates into [`Inbound`] events and
//! outgoing messages into inline keyboards.

use clinicbot_booking::{Command, Inbound};
use clinicbot_common::error::TransportError;
use clinicbot_common::models::{Button, ChatId, OutgoingMessage, UserId};
use clinicbot_common::services::{BoxFuture, ChatTransport};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::app::BookingDispatcher;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum BotCommand {
    #[command(description = "show the main menu")]
    Start,
    #[command(description = "show the main menu")]
    Help,
}

impl From<BotCommand> for Command {
    fn from(command: BotCommand) -> Self {
        match command {
            BotCommand::Start => Command::Start,
            BotCommand::Help => Command::Help,
        }
    }
}

/// Sends replies through the Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

pub fn keyboard(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.payload.clone()))
            .collect::<Vec<_>>()
    }))
}

impl ChatTransport for TelegramTransport {
    fn send(&self, chat: ChatId, message: OutgoingMessage) -> BoxFuture<'_, (), TransportError> {
        Box::pin(async move {
            let request = self
                .bot
                .send_message(teloxide::types::ChatId(chat.0), message.text);
            let request = if message.buttons.is_empty() {
                request
            } else {
                request.reply_markup(keyboard(&message.buttons))
            };
            request
                .await
                .map(|_| ())
                .map_err(|e| TransportError(e.to_string()))
        })
    }

    fn answer_callback(&self, callback_id: &str) -> BoxFuture<'_, (), TransportError> {
        let callback_id = CallbackQueryId(callback_id.to_string());
        Box::pin(async move {
            self.bot
                .answer_callback_query(callback_id)
                .await
                .map(|_| ())
                .map_err(|e| TransportError(e.to_string()))
        })
    }
}

fn sender(msg: &Message) -> Option<(UserId, ChatId)> {
    let from = msg.from.as_ref()?;
    Some((UserId(from.id.0 as i64), ChatId(msg.chat.id.0)))
}

async fn command_handler(
    msg: Message,
    cmd: BotCommand,
    dispatcher: Arc<BookingDispatcher>,
) -> ResponseResult<()> {
    if let Some((user, chat)) = sender(&msg) {
        dispatcher.handle(user, chat, Inbound::Command(cmd.into())).await;
    }
    Ok(())
}

async fn callback_handler(q: CallbackQuery, dispatcher: Arc<BookingDispatcher>) -> ResponseResult<()> {
    let Some(payload) = q.data.clone() else {
        debug!("callback without data");
        return Ok(());
    };
    let user = UserId(q.from.id.0 as i64);
    let chat = q
        .message
        .as_ref()
        .map(|m| ChatId(m.chat().id.0))
        .unwrap_or(ChatId(user.0));

    let inbound = Inbound::Callback {
        id: q.id.to_string(),
        payload,
    };
    dispatcher.handle(user, chat, inbound).await;
    Ok(())
}

async fn message_handler(msg: Message, dispatcher: Arc<BookingDispatcher>) -> ResponseResult<()> {
    let (Some((user, chat)), Some(text)) = (sender(&msg), msg.text()) else {
        debug!(chat_id = msg.chat.id.0, "ignoring message without text or sender");
        return Ok(());
    };
    dispatcher.handle(user, chat, Inbound::from_text(text)).await;
    Ok(())
}

/// Publishes `/start` and `/help` in the client's command menu.
pub async fn register_commands(bot: &Bot) {
    match bot.set_my_commands(BotCommand::bot_commands()).await {
        Ok(_) => info!("bot commands registered"),
        Err(e) => warn!(error = %e, "could not register bot commands"),
    }
}

/// Long-polls Telegram until Ctrl-C.
pub async fn run_polling(bot: Bot, dispatcher: Arc<BookingDispatcher>) {
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<BotCommand>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    info!("starting Telegram long polling");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_keep_rows_and_payloads() {
        let markup = keyboard(&[
            vec![Button::new("Book an appointment", "book"), Button::new("My bookings", "my_bookings")],
            vec![Button::new("Cancel booking", "cancel_3")],
        ]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "Cancel booking");
    }

    #[test]
    fn bot_commands_map_to_menu_commands() {
        assert_eq!(Command::from(BotCommand::Start), Command::Start);
        assert_eq!(Command::from(BotCommand::Help), Command::Help);
        let descriptions = BotCommand::descriptions().to_string();
        assert!(descriptions.contains("/start"));
        assert!(descriptions.contains("/help"));
    }
}
