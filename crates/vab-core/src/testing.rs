//! In-memory fakes of the ports, plus the fixture data used across tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::{
    config::{LinkConfig, Thresholds},
    domain::{
        Category, ChatId, EntityKey, MessageId, MessageRef, Outcome, Phase, PostKind, Preference,
        PreferenceUpdate, QuorumSettings,
    },
    engine::{Endpoints, NotificationEngine},
    menu::MenuState,
    messaging::{port::MessagingPort, types::ReplyKeyboard},
    ports::{RecordStore, VotingApi},
    render::Renderer,
    errors::HttpMethod,
    Error, Result,
};

pub fn links() -> LinkConfig {
    LinkConfig {
        portal_url_prefix: "https://portal.devxdao.com/".to_string(),
        proposal_url: "app/proposal/".to_string(),
        topic_url: "https://forum.devxdao.com/t/".to_string(),
    }
}

pub fn endpoints() -> Endpoints {
    Endpoints {
        informal: "informal".to_string(),
        formal: "formal".to_string(),
        completed: "completed".to_string(),
        discussions: "discussions".to_string(),
        proposal: "proposal/".to_string(),
    }
}

pub fn engine_with(
    api: impl Into<Arc<FakeApi>>,
    store: impl Into<Arc<MemoryStore>>,
) -> NotificationEngine {
    let api: Arc<FakeApi> = api.into();
    let store: Arc<MemoryStore> = store.into();
    NotificationEngine::new(
        api,
        store,
        endpoints(),
        Renderer::new(links(), Thresholds::default()),
        Thresholds::default(),
    )
}

pub mod fixtures {
    use super::*;

    pub fn quorum() -> QuorumSettings {
        QuorumSettings {
            total_members: 40,
            rate_grant: 51.0,
            rate_milestone: 51.0,
            rate_simple: 51.0,
        }
    }

    pub fn informal_json() -> Vec<Value> {
        vec![
            json!({
                "id": 2000001, "proposalId": 1000001, "content_type": "simple",
                "type": "informal", "result_count": 0, "title": "Simple proposal 1",
                "timeLeft": "23:59:00", "total_user_va": 40, "total_member": 0,
                "updated_at": "2022-05-20T08:05:06.000000Z"
            }),
            json!({
                "id": 2000002, "proposalId": 1000002, "content_type": "simple",
                "type": "informal", "result_count": 0, "title": "Simple proposal 2",
                "timeLeft": "23:55:00", "total_user_va": 40, "total_member": 0,
                "updated_at": "2022-05-20T08:05:06.000000Z"
            }),
        ]
    }

    pub fn formal_json() -> Vec<Value> {
        vec![json!({
            "id": 2000003, "proposalId": 1000003, "content_type": "simple",
            "type": "formal", "result_count": 1, "title": "Simple proposal 3 in Formal",
            "timeLeft": "23:55:00", "total_user_va": 40, "total_member": 33,
            "updated_at": "2022-05-20T08:05:06.000000Z"
        })]
    }

    pub fn completed_json() -> Vec<Value> {
        let updated = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        vec![
            json!({
                "id": 5000001, "proposalId": 6000001, "content_type": "simple",
                "type": "formal", "result_count": 3, "title": "Completed failed with no quorum",
                "result": "no-quorum", "total_member": 33, "updated_at": updated
            }),
            json!({
                "id": 5000002, "proposalId": 6000002, "content_type": "grant",
                "type": "formal", "result_count": 30, "title": "Completed grant",
                "result": "passed", "total_member": 33, "updated_at": updated
            }),
        ]
    }

    /// Ages are relative to `now`: two fresh, one inside the ending window, one dead.
    pub fn discussions_json(now: DateTime<Utc>) -> Vec<Value> {
        let days_ago = |d: i64| (now - chrono::Duration::days(d)).to_rfc3339();
        vec![
            json!({
                "id": 4000001, "type": "grant", "title": "Interesting proposal in discussion",
                "approved_at": days_ago(2), "attestation": { "rate": 31.5 },
                "discourse_topic_id": 17
            }),
            json!({
                "id": 4000002, "type": "grant", "title": "Quiet discussion",
                "approved_at": days_ago(2), "attestation": { "rate": 10 }
            }),
            json!({
                "id": 4000003, "type": "simple", "title": "Discussion ending soon",
                "approved_at": days_ago(88), "attestation": { "rate": 12 }
            }),
            json!({
                "id": 4000004, "type": "simple", "title": "Old discussion",
                "approved_at": days_ago(120), "attestation": { "rate": 40 }
            }),
            json!({
                "id": 4000005, "type": "grant", "title": "Almost promoted",
                "approved_at": days_ago(5), "attestation": { "rate": "48" }
            }),
        ]
    }

    fn parse<T: serde::de::DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    pub fn informal_votes() -> Vec<crate::votes::Vote> {
        parse(informal_json())
    }

    pub fn formal_votes() -> Vec<crate::votes::Vote> {
        parse(formal_json())
    }

    pub fn completed_votes() -> Vec<crate::votes::Vote> {
        parse(completed_json())
    }

    pub fn discussions(now: DateTime<Utc>) -> Vec<crate::votes::Discussion> {
        parse(discussions_json(now))
    }
}

#[derive(Default)]
struct ApiState {
    informal: Vec<Value>,
    formal: Vec<Value>,
    completed: Vec<Value>,
    discussions: Vec<Value>,
    fail_next: Option<String>,
    fetches: Vec<String>,
    invalidations: usize,
}

/// Serves fixed collections keyed by the paths in [`endpoints`].
pub struct FakeApi {
    state: Mutex<ApiState>,
    quorum: QuorumSettings,
}

impl FakeApi {
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(ApiState::default()),
            quorum: fixtures::quorum(),
        }
    }

    pub fn with_fixtures() -> Self {
        let api = Self::empty();
        {
            let mut st = api.state.lock().unwrap();
            st.informal = fixtures::informal_json();
            st.formal = fixtures::formal_json();
            st.completed = fixtures::completed_json();
            st.discussions = fixtures::discussions_json(Utc::now());
        }
        api
    }

    pub fn push_vote(&self, phase: Phase, vote: Value) {
        let mut st = self.state.lock().unwrap();
        match phase {
            Phase::Informal => st.informal.push(vote),
            Phase::Formal => st.formal.push(vote),
        }
    }

    pub fn push_completed(&self, vote: Value) {
        self.state.lock().unwrap().completed.push(vote);
    }

    pub fn clear_active(&self) {
        let mut st = self.state.lock().unwrap();
        st.informal.clear();
        st.formal.clear();
    }

    pub fn fail_next(&self, reason: &str) {
        self.state.lock().unwrap().fail_next = Some(reason.to_string());
    }

    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn invalidations(&self) -> usize {
        self.state.lock().unwrap().invalidations
    }
}

#[async_trait]
impl VotingApi for FakeApi {
    async fn fetch(&self, endpoint: &str) -> Result<Value> {
        let mut st = self.state.lock().unwrap();
        st.fetches.push(endpoint.to_string());
        if let Some(reason) = st.fail_next.take() {
            return Err(Error::request(HttpMethod::Get, endpoint, reason));
        }
        Ok(match endpoint {
            "informal" => json!({ "votes": st.informal }),
            "formal" => json!({ "votes": st.formal }),
            "completed" => json!({ "votes": st.completed }),
            "discussions" => json!({ "proposals": st.discussions }),
            other => {
                let id = other.strip_prefix("proposal/").unwrap_or_default();
                let found = st
                    .informal
                    .iter()
                    .chain(st.formal.iter())
                    .find(|v| v["proposalId"].to_string() == id);
                match found {
                    Some(v) => json!({
                        "success": true,
                        "proposal": { "title": v["title"], "short_description": "Fixture proposal." }
                    }),
                    None => json!({ "success": false }),
                }
            }
        })
    }

    async fn quorum(&self) -> Result<QuorumSettings> {
        Ok(self.quorum)
    }

    async fn invalidate(&self) {
        self.state.lock().unwrap().invalidations += 1;
    }
}

#[derive(Clone, Debug)]
pub struct PostRow {
    pub kind: PostKind,
    pub outcome: Outcome,
    pub key: Option<EntityKey>,
    pub subscriber: ChatId,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
struct StoreState {
    posts: Vec<PostRow>,
    preferences: HashMap<(ChatId, Category), Preference>,
    watched: HashMap<ChatId, Vec<i64>>,
    menus: HashMap<ChatId, MenuState>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn posts(&self) -> Vec<PostRow> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn put_preference(&self, subscriber: ChatId, category: Category, pref: Preference) {
        self.state
            .lock()
            .unwrap()
            .preferences
            .insert((subscriber, category), pref);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn was_delivered(
        &self,
        kind: PostKind,
        key: EntityKey,
        subscriber: ChatId,
    ) -> Result<bool> {
        Ok(self.state.lock().unwrap().posts.iter().any(|p| {
            p.kind == kind
                && p.outcome == Outcome::Success
                && p.key == Some(key)
                && p.subscriber == subscriber
        }))
    }

    async fn was_delivered_since(
        &self,
        kind: PostKind,
        subscriber: ChatId,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.state.lock().unwrap().posts.iter().any(|p| {
            p.kind == kind
                && p.outcome == Outcome::Success
                && p.subscriber == subscriber
                && p.at > since
        }))
    }

    async fn record_delivery(
        &self,
        kind: PostKind,
        outcome: Outcome,
        key: Option<EntityKey>,
        subscriber: ChatId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.state.lock().unwrap().posts.push(PostRow {
            kind,
            outcome,
            key,
            subscriber,
            at,
        });
        Ok(())
    }

    async fn preference(&self, subscriber: ChatId, category: Category) -> Result<Preference> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .preferences
            .get(&(subscriber, category))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_preference(
        &self,
        subscriber: ChatId,
        category: Category,
        update: PreferenceUpdate,
    ) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let pref = st.preferences.entry((subscriber, category)).or_default();
        match update {
            PreferenceUpdate::Weekday(day, on) => {
                pref.weekdays[day.num_days_from_sunday() as usize] = on
            }
            PreferenceUpdate::DeliveryTime(t) => pref.delivery_time = t,
            PreferenceUpdate::Timezone(offset) => pref.timezone_offset = offset,
        }
        Ok(())
    }

    async fn subscribers(&self, category: Category) -> Result<Vec<(ChatId, Preference)>> {
        let st = self.state.lock().unwrap();
        let mut out: Vec<(ChatId, Preference)> = st
            .preferences
            .iter()
            .filter(|((_, c), _)| *c == category)
            .map(|((chat, _), p)| (*chat, p.clone()))
            .collect();
        out.sort_by_key(|(chat, _)| *chat);
        Ok(out)
    }

    async fn watched_proposals(&self, subscriber: ChatId) -> Result<Vec<i64>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .watched
            .get(&subscriber)
            .cloned()
            .unwrap_or_default())
    }

    async fn watch_proposal(&self, subscriber: ChatId, proposal_id: i64) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        let list = st.watched.entry(subscriber).or_default();
        if list.contains(&proposal_id) {
            return Ok(false);
        }
        list.push(proposal_id);
        Ok(true)
    }

    async fn unwatch_proposal(&self, subscriber: ChatId, proposal_id: i64) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        let list = st.watched.entry(subscriber).or_default();
        let before = list.len();
        list.retain(|id| *id != proposal_id);
        Ok(list.len() != before)
    }

    async fn menu(&self, chat: ChatId) -> Result<Option<MenuState>> {
        Ok(self.state.lock().unwrap().menus.get(&chat).copied())
    }

    async fn set_menu(&self, chat: ChatId, menu: MenuState) -> Result<()> {
        self.state.lock().unwrap().menus.insert(chat, menu);
        Ok(())
    }
}

/// What a [`RecordingMessenger`] was asked to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Markdown(ChatId, String),
    Plain(ChatId, String),
    Keyboard(ChatId, String, ReplyKeyboard),
    ForceReply(ChatId, String),
}

#[derive(Default)]
pub struct RecordingMessenger {
    log: Mutex<Vec<Sent>>,
    failing: Mutex<Vec<ChatId>>,
}

impl RecordingMessenger {
    /// Text messages (markdown and plain) in send order.
    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Markdown(c, t) | Sent::Plain(c, t) => Some((*c, t.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn log(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn fail_for(&self, chat: ChatId) {
        self.failing.lock().unwrap().push(chat);
    }

    fn push(&self, chat: ChatId, entry: Sent) -> Result<MessageRef> {
        if self.failing.lock().unwrap().contains(&chat) {
            return Err(Error::External(format!("chat {} unreachable", chat.0)));
        }
        let mut log = self.log.lock().unwrap();
        log.push(entry);
        Ok(MessageRef {
            chat_id: chat,
            message_id: MessageId(log.len() as i32),
        })
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_markdown(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.push(chat_id, Sent::Markdown(chat_id, text.to_string()))
    }

    async fn send_plain(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.push(chat_id, Sent::Plain(chat_id, text.to_string()))
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: ReplyKeyboard,
    ) -> Result<MessageRef> {
        self.push(chat_id, Sent::Keyboard(chat_id, text.to_string(), keyboard))
    }

    async fn send_force_reply(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.push(chat_id, Sent::ForceReply(chat_id, text.to_string()))
    }
}
