//! Telegram adapter (teloxide).
//!
//! Implements the `vab-core` MessagingPort over the Telegram Bot API and hosts
//! the interactive front-end handlers.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ForceReply, KeyboardButton, KeyboardMarkup, ParseMode, ReplyMarkup},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use vab_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::ReplyKeyboard},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn keyboard_markup(keyboard: &ReplyKeyboard) -> KeyboardMarkup {
        let rows: Vec<Vec<KeyboardButton>> = keyboard
            .rows
            .iter()
            .map(|row| row.iter().map(|label| KeyboardButton::new(label.clone())).collect())
            .collect();
        KeyboardMarkup::new(rows).resize_keyboard(true)
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram flood limit hit");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
        markup: Option<ReplyMarkup>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
                if let Some(mode) = parse_mode {
                    req = req.parse_mode(mode);
                }
                if let Some(m) = markup.clone() {
                    req = req.reply_markup(m);
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_markdown(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.send(chat_id, text, Some(ParseMode::MarkdownV2), None).await
    }

    async fn send_plain(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.send(chat_id, text, None, None).await
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: ReplyKeyboard,
    ) -> Result<MessageRef> {
        let markup = ReplyMarkup::Keyboard(Self::keyboard_markup(&keyboard));
        self.send(chat_id, text, None, Some(markup)).await
    }

    async fn send_force_reply(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let markup = ReplyMarkup::ForceReply(ForceReply::new());
        self.send(chat_id, text, None, Some(markup)).await
    }
}
