use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use vab_core::{
    domain::ChatId, menu::Menu, messaging::port::MessagingPort, security::VerifiedUsers,
};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub menu: Arc<Menu>,
    pub messenger: Arc<dyn MessagingPort>,
    /// Front-end users must be members of this chat.
    pub broadcast_chat: ChatId,
    pub verified: Arc<VerifiedUsers>,
    pub chat_locks: Arc<ChatLocks>,
}

impl AppState {
    pub fn new(menu: Arc<Menu>, messenger: Arc<dyn MessagingPort>, broadcast_chat: ChatId) -> Self {
        Self {
            menu,
            messenger,
            broadcast_chat,
            verified: Arc::new(VerifiedUsers::default()),
            chat_locks: Arc::new(ChatLocks::default()),
        }
    }
}

/// Serializes updates per chat so menu state reads and writes do not interleave.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Long-poll Telegram until the future is dropped.
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "telegram front-end started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed; polling anyway"),
    }

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .build()
        .dispatch()
        .await;

    Ok(())
}
