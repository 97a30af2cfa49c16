use std::{path::Path, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vab_core::{
    domain::{Category, ChatId, EntityKey, Outcome, PostKind, Preference, PreferenceUpdate},
    menu::MenuState,
    ports::RecordStore,
};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// [`RecordStore`] over a single SQLite connection.
///
/// Each port call takes the connection lock for one statement, so calls from
/// the dispatcher and the chat front-end interleave freely.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the database file, refusing an outdated schema.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::open(path)?;
        let pending = db.pending_migrations()?;
        if pending > 0 {
            return Err(StoreError::PendingMigrations(pending));
        }
        Ok(Self::new(db))
    }

    fn with<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> vab_core::Result<T> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&db)?)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn was_delivered(
        &self,
        kind: PostKind,
        key: EntityKey,
        subscriber: ChatId,
    ) -> vab_core::Result<bool> {
        self.with(|db| db.has_success(kind, key, subscriber))
    }

    async fn was_delivered_since(
        &self,
        kind: PostKind,
        subscriber: ChatId,
        since: DateTime<Utc>,
    ) -> vab_core::Result<bool> {
        self.with(|db| db.has_success_since(kind, subscriber, since))
    }

    async fn record_delivery(
        &self,
        kind: PostKind,
        outcome: Outcome,
        key: Option<EntityKey>,
        subscriber: ChatId,
        at: DateTime<Utc>,
    ) -> vab_core::Result<()> {
        let written = self.with(|db| db.insert_post(kind, outcome, key, subscriber, at))?;
        if !written {
            tracing::debug!(?kind, ?key, chat_id = subscriber.0, "success already recorded");
        }
        Ok(())
    }

    async fn preference(
        &self,
        subscriber: ChatId,
        category: Category,
    ) -> vab_core::Result<Preference> {
        Ok(self
            .with(|db| db.preference(subscriber, category))?
            .unwrap_or_default())
    }

    async fn set_preference(
        &self,
        subscriber: ChatId,
        category: Category,
        update: PreferenceUpdate,
    ) -> vab_core::Result<()> {
        self.with(|db| db.update_preference(subscriber, category, update))
    }

    async fn subscribers(&self, category: Category) -> vab_core::Result<Vec<(ChatId, Preference)>> {
        self.with(|db| db.subscribers(category))
    }

    async fn watched_proposals(&self, subscriber: ChatId) -> vab_core::Result<Vec<i64>> {
        self.with(|db| db.watched_proposals(subscriber))
    }

    async fn watch_proposal(&self, subscriber: ChatId, proposal_id: i64) -> vab_core::Result<bool> {
        self.with(|db| db.watch_proposal(subscriber, proposal_id))
    }

    async fn unwatch_proposal(
        &self,
        subscriber: ChatId,
        proposal_id: i64,
    ) -> vab_core::Result<bool> {
        self.with(|db| db.unwatch_proposal(subscriber, proposal_id))
    }

    async fn menu(&self, chat: ChatId) -> vab_core::Result<Option<MenuState>> {
        self.with(|db| db.menu(chat))
    }

    async fn set_menu(&self, chat: ChatId, menu: MenuState) -> vab_core::Result<()> {
        self.with(|db| db.set_menu(chat, menu))
    }
}
