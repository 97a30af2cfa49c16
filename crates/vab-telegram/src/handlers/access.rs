use teloxide::{
    prelude::*,
    types::{ChatMemberKind, UserId},
};

use crate::router::AppState;

/// Whether `user` may use the bot: a present member of the broadcast chat.
///
/// Positive answers are cached for the process lifetime.
pub(super) async fn verify(bot: &Bot, state: &AppState, user: UserId) -> bool {
    let id = user.0 as i64;
    if state.verified.contains(id) {
        return true;
    }

    let chat = teloxide::types::ChatId(state.broadcast_chat.0);
    match bot.get_chat_member(chat, user).await {
        Ok(member) if is_member(&member.kind) => {
            state.verified.insert(id);
            true
        }
        Ok(_) => {
            tracing::info!(user_id = id, "user is not a member of the broadcast chat");
            false
        }
        Err(e) => {
            tracing::warn!(user_id = id, error = %e, "membership check failed");
            false
        }
    }
}

fn is_member(kind: &ChatMemberKind) -> bool {
    !matches!(kind, ChatMemberKind::Left | ChatMemberKind::Banned(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_users_are_not_members() {
        assert!(is_member(&ChatMemberKind::Member));
        assert!(!is_member(&ChatMemberKind::Left));
    }
}
