use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::ReplyKeyboard,
    Result,
};

/// Outbound chat transport.
///
/// All text is MarkdownV2; callers escape their content with
/// [`crate::formatting::escape_markdown`].
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_markdown(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_plain(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Send text together with a persistent reply keyboard (menu).
    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: ReplyKeyboard,
    ) -> Result<MessageRef>;

    /// Send a plain prompt that asks the client to reply to it.
    async fn send_force_reply(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
}
