use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    calendar::{self, Eligibility},
    domain::{Category, ChatId, EntityKey, Outcome, PostKind, Preference, PreferenceUpdate, QuorumSettings},
    menu::MenuState,
    Result,
};

/// Authenticated, read-only access to the upstream voting API.
#[async_trait]
pub trait VotingApi: Send + Sync {
    /// GET a JSON document relative to the API prefix, logging in first if needed.
    async fn fetch(&self, endpoint: &str) -> Result<serde_json::Value>;

    /// Quorum constants captured at the last login (logs in if needed).
    async fn quorum(&self) -> Result<QuorumSettings>;

    /// Forget the cached session; the next call re-authenticates.
    async fn invalidate(&self);
}

/// Durable dedup records, subscriber preferences and menu state.
///
/// Every call is self-contained; no transaction spans two calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether a *successful* delivery of `kind` for `key` exists for `subscriber`.
    async fn was_delivered(&self, kind: PostKind, key: EntityKey, subscriber: ChatId)
        -> Result<bool>;

    /// Whether a successful delivery of `kind` happened for `subscriber` after `since`.
    async fn was_delivered_since(
        &self,
        kind: PostKind,
        subscriber: ChatId,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    async fn record_delivery(
        &self,
        kind: PostKind,
        outcome: Outcome,
        key: Option<EntityKey>,
        subscriber: ChatId,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Stored preference, or defaults when the chat never changed this category.
    async fn preference(&self, subscriber: ChatId, category: Category) -> Result<Preference>;

    async fn set_preference(
        &self,
        subscriber: ChatId,
        category: Category,
        update: PreferenceUpdate,
    ) -> Result<()>;

    /// All chats with a stored preference row for `category`.
    async fn subscribers(&self, category: Category) -> Result<Vec<(ChatId, Preference)>>;

    async fn watched_proposals(&self, subscriber: ChatId) -> Result<Vec<i64>>;

    /// Returns false when the proposal was already on the list.
    async fn watch_proposal(&self, subscriber: ChatId, proposal_id: i64) -> Result<bool>;

    /// Returns false when the proposal was not on the list.
    async fn unwatch_proposal(&self, subscriber: ChatId, proposal_id: i64) -> Result<bool>;

    async fn menu(&self, chat: ChatId) -> Result<Option<MenuState>>;

    async fn set_menu(&self, chat: ChatId, menu: MenuState) -> Result<()>;

    /// Subscribers of `category` that should be notified at `now`.
    ///
    /// Weekdays are evaluated in each subscriber's local day (general timezone
    /// offset). Digest subscribers must also be inside their delivery slot and
    /// not yet served today.
    async fn list_eligible_subscribers(
        &self,
        category: Category,
        now: DateTime<Utc>,
        retry_window: Duration,
    ) -> Result<Vec<ChatId>> {
        let mut out = Vec::new();
        for (chat, pref) in self.subscribers(category).await? {
            if chat.is_broadcast() {
                continue;
            }
            let offset = self
                .preference(chat, Category::General)
                .await?
                .timezone_offset;
            match calendar::eligibility(category, &pref, offset, now, retry_window) {
                Eligibility::Never => {}
                Eligibility::Now => out.push(chat),
                Eligibility::UnlessDeliveredSince(since) => {
                    if !self
                        .was_delivered_since(PostKind::Digest, chat, since)
                        .await?
                    {
                        out.push(chat);
                    }
                }
            }
        }
        Ok(out)
    }
}
