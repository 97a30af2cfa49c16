//! Access bookkeeping for the interactive front-end.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::domain::ChatId;

/// Incoming messages older than this are ignored (bot restarts, network hiccups).
pub const MAX_MESSAGE_AGE_SECS: i64 = 60;

/// Per-chat cooldown for on-demand queries. Advisory only.
#[derive(Debug)]
pub struct Cooldown {
    delay: Duration,
    last: Mutex<HashMap<ChatId, Instant>>,
}

impl Cooldown {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// True when `chat` may run an action now; starts its cooldown.
    pub fn try_acquire(&self, chat: ChatId) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match last.get(&chat) {
            Some(at) if now.saturating_duration_since(*at) < self.delay => false,
            _ => {
                last.insert(chat, now);
                true
            }
        }
    }
}

/// Users already confirmed as members of the broadcast chat.
///
/// Lives for the process lifetime; a restart re-checks everyone.
#[derive(Debug, Default)]
pub struct VerifiedUsers {
    ids: Mutex<HashSet<i64>>,
}

impl VerifiedUsers {
    pub fn contains(&self, user_id: i64) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&user_id)
    }

    pub fn insert(&self, user_id: i64) {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id);
    }
}

pub fn is_stale(sent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now - sent_at).num_seconds() > MAX_MESSAGE_AGE_SECS
}
