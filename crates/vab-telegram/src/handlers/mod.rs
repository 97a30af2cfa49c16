//! Telegram update handlers.
//!
//! Each message is checked (age, channel membership), turned into a menu
//! [`Input`] and answered with the replies the menu state machine produces.

use std::sync::Arc;

use chrono::Utc;
use teloxide::{prelude::*, types::Message};

use vab_core::{
    domain::ChatId,
    menu::{access_denied, Input, Reply},
    messaging::port::MessagingPort,
    security::is_stale,
};

use crate::router::AppState;

mod access;

const SOMETHING_WENT_WRONG: &str = "Something went wrong, please try again later.";

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat = ChatId(msg.chat.id.0);
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if is_stale(msg.date, Utc::now()) {
        tracing::warn!(chat_id = chat.0, "message older than 60 seconds, ignoring");
        return Ok(());
    }

    if !access::verify(&bot, &state, user.id).await {
        if let Err(e) = state.messenger.send_markdown(chat, &access_denied()).await {
            tracing::warn!(chat_id = chat.0, error = %e, "failed to send access denied reply");
        }
        return Ok(());
    }

    let reply_to = msg.reply_to_message().and_then(|m| m.text());
    let input = input_from(text, reply_to, &user.first_name);

    let _guard = state.chat_locks.lock_chat(chat.0).await;
    match state.menu.handle(chat, input, Utc::now()).await {
        Ok(replies) => send_replies(&state, chat, replies).await,
        Err(e) => {
            tracing::error!(chat_id = chat.0, error = %e, "menu action failed");
            send_failure_notice(state.messenger.as_ref(), chat).await;
        }
    }

    Ok(())
}

fn input_from(text: &str, reply_to: Option<&str>, first_name: &str) -> Input {
    if is_start_command(text) {
        return Input::Start {
            name: first_name.to_string(),
        };
    }
    match reply_to {
        Some(to) => Input::Reply {
            to: to.to_string(),
            text: text.trim().to_string(),
        },
        None => Input::Text(text.to_string()),
    }
}

/// `/start`, optionally addressed (`/start@bot`) or with a payload.
fn is_start_command(text: &str) -> bool {
    let Some(cmd) = text.trim().split_whitespace().next() else {
        return false;
    };
    cmd == "/start" || cmd.starts_with("/start@")
}

/// Tell the chat its request failed. Returns whether the notice went out.
async fn send_failure_notice(messenger: &dyn MessagingPort, chat: ChatId) -> bool {
    match messenger.send_plain(chat, SOMETHING_WENT_WRONG).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(chat_id = chat.0, error = %e, "failed to send failure notice");
            false
        }
    }
}

async fn send_replies(state: &AppState, chat: ChatId, replies: Vec<Reply>) {
    for reply in replies {
        let sent = match reply {
            Reply::Markdown(text) => state.messenger.send_markdown(chat, &text).await,
            Reply::Plain(text) => state.messenger.send_plain(chat, &text).await,
            Reply::Keyboard { text, keyboard } => {
                state.messenger.send_keyboard(chat, &text, keyboard).await
            }
            Reply::ForceReply(text) => state.messenger.send_force_reply(chat, &text).await,
        };
        if let Err(e) = sent {
            tracing::warn!(chat_id = chat.0, error = %e, "failed to send reply");
            break;
        }
    }
}
