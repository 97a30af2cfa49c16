//! Notification Engine: classifies upstream votes and discussions and filters
//! out events already delivered to a subscriber.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::{
    config::{ApiConfig, Thresholds},
    domain::{ChatId, EntityKey, Phase, PostKind, QuorumSettings},
    ports::{RecordStore, VotingApi},
    render::{DiscussionBuckets, Renderer},
    votes::{
        ContentType, Discussion, DiscussionsEnvelope, ProposalEnvelope, ProposalSummary, Vote,
        VotesEnvelope,
    },
    Result,
};

/// Discussions older than this are no longer active.
pub const DISCUSSION_LIFETIME_DAYS: i64 = 90;
/// Attestation rate that promotes a discussion to informal voting.
pub const PROMOTION_RATE: f64 = 51.0;
/// Fewer missing attestations than this earn a discussion extra emphasis.
pub const EMPHASIS_VOTES_NEEDED: i64 = 3;
/// Completed votes updated within this many hours appear in the digest.
pub const RECENTLY_COMPLETED_HOURS: i64 = 24;

/// Endpoint paths of the collections, relative to the API prefix.
#[derive(Clone, Debug)]
pub struct Endpoints {
    pub informal: String,
    pub formal: String,
    pub completed: String,
    pub discussions: String,
    pub proposal: String,
}

impl From<&ApiConfig> for Endpoints {
    fn from(api: &ApiConfig) -> Self {
        Self {
            informal: api.informal_url.clone(),
            formal: api.formal_url.clone(),
            completed: api.completed_url.clone(),
            discussions: api.discussions_url.clone(),
            proposal: api.proposal_json_url.clone(),
        }
    }
}

/// Rendered text plus the vote keys it covers, recorded after delivery.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub keys: Vec<EntityKey>,
    pub text: String,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.text.is_empty()
    }

    /// Vote ids of one phase, in selection order.
    pub fn ids(&self, phase: Phase) -> Vec<i64> {
        self.keys
            .iter()
            .filter(|k| k.phase == phase)
            .map(|k| k.vote_id)
            .collect()
    }

    pub fn vote_ids(&self) -> Vec<i64> {
        self.keys.iter().map(|k| k.vote_id).collect()
    }
}

/// Votes fetched once and shared by all selections of a cycle.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub informal: Vec<Vote>,
    pub formal: Vec<Vote>,
    pub completed: Vec<Vote>,
    pub quorum: QuorumSettings,
}

impl Snapshot {
    pub fn active(&self, phase: Phase) -> &[Vote] {
        match phase {
            Phase::Informal => &self.informal,
            Phase::Formal => &self.formal,
        }
    }
}

pub struct NotificationEngine {
    api: Arc<dyn VotingApi>,
    store: Arc<dyn RecordStore>,
    endpoints: Endpoints,
    thresholds: Thresholds,
    renderer: Renderer,
}

impl NotificationEngine {
    pub fn new(
        api: Arc<dyn VotingApi>,
        store: Arc<dyn RecordStore>,
        endpoints: Endpoints,
        renderer: Renderer,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            api,
            store,
            endpoints,
            thresholds,
            renderer,
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let value = self.api.fetch(endpoint).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Active votes of `phase`. The requested phase wins over the record's own field.
    pub async fn active_votes(&self, phase: Phase) -> Result<Vec<Vote>> {
        let endpoint = match phase {
            Phase::Informal => &self.endpoints.informal,
            Phase::Formal => &self.endpoints.formal,
        };
        let envelope: VotesEnvelope = self.fetch(endpoint).await?;
        Ok(envelope
            .votes
            .into_iter()
            .map(|mut v| {
                v.phase = phase;
                v
            })
            .collect())
    }

    pub async fn completed_votes(&self) -> Result<Vec<Vote>> {
        let envelope: VotesEnvelope = self.fetch(&self.endpoints.completed).await?;
        Ok(envelope.votes)
    }

    pub async fn discussions(&self) -> Result<Vec<Discussion>> {
        let envelope: DiscussionsEnvelope = self.fetch(&self.endpoints.discussions).await?;
        Ok(envelope.proposals)
    }

    /// Title and description of one proposal; `None` when upstream reports no success.
    pub async fn proposal(&self, id: i64) -> Result<Option<ProposalSummary>> {
        let endpoint = format!("{}{id}", self.endpoints.proposal);
        let envelope: ProposalEnvelope = self.fetch(&endpoint).await?;
        Ok(envelope.proposal.filter(|_| envelope.success))
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            informal: self.active_votes(Phase::Informal).await?,
            formal: self.active_votes(Phase::Formal).await?,
            completed: self.completed_votes().await?,
            quorum: self.api.quorum().await?,
        })
    }

    async fn undelivered(
        &self,
        kind: PostKind,
        subscriber: ChatId,
        votes: impl IntoIterator<Item = Vote>,
    ) -> Result<Vec<Vote>> {
        let mut out = Vec::new();
        for vote in votes {
            if !self.store.was_delivered(kind, vote.key(), subscriber).await? {
                out.push(vote);
            }
        }
        Ok(out)
    }

    /// Active votes not yet announced to `subscriber`, optionally limited to
    /// a watch-list of proposal numbers.
    pub async fn new_phase_entries(
        &self,
        subscriber: ChatId,
        watch: Option<&[i64]>,
    ) -> Result<Selection> {
        let snapshot = self.snapshot().await?;
        self.select_new_phase_entries(&snapshot, subscriber, watch)
            .await
    }

    pub async fn select_new_phase_entries(
        &self,
        snapshot: &Snapshot,
        subscriber: ChatId,
        watch: Option<&[i64]>,
    ) -> Result<Selection> {
        let mut selection = Selection::default();
        for phase in Phase::ALL {
            let candidates = snapshot
                .active(phase)
                .iter()
                .filter(|v| watch.map_or(true, |ids| ids.contains(&v.proposal_id)))
                .cloned();
            let fresh = self
                .undelivered(PostKind::NewPhaseEntry, subscriber, candidates)
                .await?;
            selection.keys.extend(fresh.iter().map(Vote::key));
            selection
                .text
                .push_str(&self.renderer.new_entries_section(phase, &fresh));
        }
        Ok(selection)
    }

    /// Short-lived votes about to close without a quorum, not yet alerted.
    pub async fn expiring_no_quorum(&self, subscriber: ChatId) -> Result<Selection> {
        let snapshot = self.snapshot().await?;
        self.select_expiring_no_quorum(&snapshot, subscriber).await
    }

    pub async fn select_expiring_no_quorum(
        &self,
        snapshot: &Snapshot,
        subscriber: ChatId,
    ) -> Result<Selection> {
        let mut selection = Selection::default();
        for phase in Phase::ALL {
            let short_lived: Vec<Vote> = snapshot
                .active(phase)
                .iter()
                .filter(|v| v.content_type.is_short_lived())
                .cloned()
                .collect();
            let expiring = ending_soon(&short_lived, self.thresholds.expiring, &snapshot.quorum);
            let fresh = self
                .undelivered(PostKind::ExpiringNoQuorum, subscriber, expiring)
                .await?;
            selection.keys.extend(fresh.iter().map(Vote::key));
            selection
                .text
                .push_str(&self.renderer.expiring_section(phase, &fresh));
        }
        Ok(selection)
    }

    /// Completed votes that failed for lack of quorum, not yet reported.
    pub async fn failed_no_quorum(&self, subscriber: ChatId) -> Result<Selection> {
        let completed = self.completed_votes().await?;
        self.select_failed_no_quorum(&completed, subscriber).await
    }

    pub async fn select_failed_no_quorum(
        &self,
        completed: &[Vote],
        subscriber: ChatId,
    ) -> Result<Selection> {
        let failed = completed.iter().filter(|v| v.is_no_quorum()).cloned();
        let fresh = self
            .undelivered(PostKind::FailedNoQuorum, subscriber, failed)
            .await?;
        Ok(Selection {
            keys: fresh.iter().map(Vote::key).collect(),
            text: self.renderer.failed_section(&fresh),
        })
    }

    /// Scheduled summary: ending-soon informal, ending-soon formal, recently
    /// completed, then discussions. Empty when no section has content.
    pub async fn digest(&self, now: DateTime<Utc>) -> Result<String> {
        let snapshot = self.snapshot().await?;
        let discussions = self.discussions().await?;
        Ok(self.render_digest(&snapshot, &discussions, now))
    }

    pub fn render_digest(
        &self,
        snapshot: &Snapshot,
        discussions: &[Discussion],
        now: DateTime<Utc>,
    ) -> String {
        let soon = self.thresholds.soon;
        let informal = ending_soon(&snapshot.informal, soon, &snapshot.quorum);
        let formal = ending_soon(&snapshot.formal, soon, &snapshot.quorum);
        let completed = recently_completed(&snapshot.completed, now);
        let buckets = classify_discussions(
            discussions,
            now,
            &self.thresholds,
            snapshot.quorum.total_members,
        );

        [
            self.renderer.ending_section(Phase::Informal, &informal),
            self.renderer.ending_section(Phase::Formal, &formal),
            self.renderer.completed_section(&completed),
            self.renderer.discussions_section(&buckets),
        ]
        .concat()
    }

    /// Open short-lived votes of both phases.
    pub async fn active_list(&self) -> Result<String> {
        let mut text = String::new();
        for phase in Phase::ALL {
            let short_lived: Vec<Vote> = self
                .active_votes(phase)
                .await?
                .into_iter()
                .filter(|v| v.content_type.is_short_lived())
                .collect();
            text.push_str(&self.renderer.simple_list_section(phase, &short_lived));
        }
        Ok(text)
    }

    /// Discussion sections as shown by the on-demand query.
    pub async fn discussions_text(&self, now: DateTime<Utc>) -> Result<String> {
        let discussions = self.discussions().await?;
        let quorum = self.api.quorum().await?;
        let buckets =
            classify_discussions(&discussions, now, &self.thresholds, quorum.total_members);
        Ok(self.renderer.discussions_section(&buckets))
    }
}

/// Quorum percentage for a content type; `None` for types without a configured rate.
pub fn quorum_rate(content_type: &ContentType, quorum: &QuorumSettings) -> Option<f64> {
    match content_type {
        ContentType::Simple => Some(quorum.rate_simple),
        ContentType::Grant | ContentType::AdminGrant => Some(quorum.rate_grant),
        ContentType::Milestone => Some(quorum.rate_milestone),
        ContentType::Unknown | ContentType::Other(_) => None,
    }
}

/// True when the vote closes within `threshold` and is still short of its quorum.
///
/// Informal votes are measured against all members; formal votes against
/// their own pool (only those who voted informally).
pub fn is_ending_soon(vote: &Vote, threshold: Duration, quorum: &QuorumSettings) -> bool {
    let Some(rate) = quorum_rate(&vote.content_type, quorum) else {
        tracing::debug!(
            vote = vote.id,
            content_type = vote.content_type.as_str(),
            "no quorum rate for content type, skipping"
        );
        return false;
    };
    let Some(left) = vote.time_left() else {
        return false;
    };
    if left >= threshold {
        return false;
    }

    let eligible = match vote.phase {
        Phase::Informal => quorum.total_members,
        Phase::Formal => vote.total_member.unwrap_or(0),
    };
    if eligible == 0 {
        return false;
    }
    (vote.result_count as f64 / eligible as f64) * 100.0 < rate
}

pub fn ending_soon(votes: &[Vote], threshold: Duration, quorum: &QuorumSettings) -> Vec<Vote> {
    votes
        .iter()
        .filter(|v| is_ending_soon(v, threshold, quorum))
        .cloned()
        .collect()
}

pub fn recently_completed(votes: &[Vote], now: DateTime<Utc>) -> Vec<Vote> {
    let cutoff = now - chrono::Duration::hours(RECENTLY_COMPLETED_HOURS);
    votes
        .iter()
        .filter(|v| v.result.is_some() && v.updated_at.map_or(false, |at| at >= cutoff))
        .cloned()
        .collect()
}

/// Attestations still missing before a discussion reaches the promotion rate.
pub fn votes_needed(rate: f64, total_members: u32) -> i64 {
    let total = total_members as f64;
    let required = (total * PROMOTION_RATE / 100.0).ceil() as i64;
    let have = (rate * total / 100.0).round() as i64;
    required - have
}

pub fn classify_discussions(
    discussions: &[Discussion],
    now: DateTime<Utc>,
    thresholds: &Thresholds,
    total_members: u32,
) -> DiscussionBuckets {
    let lifetime = chrono::Duration::days(DISCUSSION_LIFETIME_DAYS);
    let ending_from = chrono::Duration::days(DISCUSSION_LIFETIME_DAYS - thresholds.ending_days);

    let mut buckets = DiscussionBuckets::default();
    for d in discussions {
        let age = now - d.approved_at;
        if age > lifetime {
            buckets.dead.push(d.clone());
            continue;
        }
        if age >= ending_from && age < lifetime {
            buckets.ending.push(d.clone());
        }
        let rate = d.attestation_rate();
        if age < lifetime && rate >= thresholds.attestation_interest && rate < PROMOTION_RATE {
            let emphasize = votes_needed(rate, total_members) < EMPHASIS_VOTES_NEEDED;
            buckets.interesting.push((d.clone(), emphasize));
        }
    }
    buckets.interesting.sort_by(|a, b| {
        b.0.attestation_rate()
            .partial_cmp(&a.0.attestation_rate())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Outcome,
        testing::{engine_with, fixtures, FakeApi, MemoryStore},
    };

    fn quorum() -> QuorumSettings {
        fixtures::quorum()
    }

    fn vote_json(
        content: &str,
        phase: Phase,
        count: u32,
        pool: Option<u32>,
        left: &str,
    ) -> serde_json::Value {
        serde_json::json!({
            "id": 1, "proposalId": 2, "content_type": content, "type": phase.as_str(),
            "result_count": count, "total_member": pool, "timeLeft": left,
        })
    }

    fn vote(content: &str, phase: Phase, count: u32, pool: Option<u32>, left: &str) -> Vote {
        serde_json::from_value(vote_json(content, phase, count, pool, left)).unwrap()
    }

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn ending_soon_requires_both_time_and_missing_quorum() {
        let q = quorum(); // 40 members, 51%
        // 20/40 = 50% < 51
        assert!(is_ending_soon(&vote("simple", Phase::Informal, 20, None, "10:00:00"), DAY, &q));
        // 21/40 = 52.5%
        assert!(!is_ending_soon(&vote("simple", Phase::Informal, 21, None, "10:00:00"), DAY, &q));
        // Not soon enough.
        assert!(!is_ending_soon(&vote("grant", Phase::Informal, 0, None, "24:00:00"), DAY, &q));
    }

    #[test]
    fn formal_votes_use_their_own_pool() {
        let q = quorum();
        // 10/33 = 30% short of quorum; 10/40 would be too.
        assert!(is_ending_soon(&vote("milestone", Phase::Formal, 10, Some(33), "01:00:00"), DAY, &q));
        // 10/15 = 66% meets quorum in the formal pool.
        assert!(!is_ending_soon(&vote("milestone", Phase::Formal, 10, Some(15), "01:00:00"), DAY, &q));
        // Missing pool never qualifies.
        assert!(!is_ending_soon(&vote("milestone", Phase::Formal, 0, None, "01:00:00"), DAY, &q));
    }

    #[test]
    fn unknown_content_types_never_qualify() {
        let q = quorum();
        assert!(!is_ending_soon(&vote("bounty", Phase::Informal, 0, None, "00:10:00"), DAY, &q));
        assert_eq!(quorum_rate(&ContentType::AdminGrant, &q), Some(q.rate_grant));
    }

    #[test]
    fn ending_soon_property_holds_over_a_grid() {
        let q = QuorumSettings {
            total_members: 40,
            rate_grant: 40.0,
            rate_milestone: 60.0,
            rate_simple: 51.0,
        };
        for content in ["simple", "grant", "admin-grant", "milestone", "other"] {
            for count in [0u32, 10, 16, 20, 24, 30, 40] {
                for left in ["00:30:00", "23:59:59", "24:00:00", "48:00:00"] {
                    let v = vote(content, Phase::Informal, count, None, left);
                    let expected = match quorum_rate(&v.content_type, &q) {
                        Some(rate) => {
                            v.time_left().unwrap() < DAY && (count as f64 / 40.0) * 100.0 < rate
                        }
                        None => false,
                    };
                    assert_eq!(is_ending_soon(&v, DAY, &q), expected, "{content} {count} {left}");
                }
            }
        }
    }

    #[test]
    fn votes_needed_rounds_like_the_portal() {
        // 51% of 40 = 20.4 -> 21 required; 47.5% of 40 = 19 present.
        assert_eq!(votes_needed(47.5, 40), 2);
        assert_eq!(votes_needed(31.0, 40), 9);
    }

    #[test]
    fn discussions_are_partitioned_by_age_and_rate() {
        let now = Utc::now();
        let buckets = classify_discussions(
            &fixtures::discussions(now),
            now,
            &Thresholds::default(),
            40,
        );
        let ids = |v: &[Discussion]| v.iter().map(|d| d.id).collect::<Vec<_>>();
        assert_eq!(ids(&buckets.dead), vec![4000004]);
        assert_eq!(ids(&buckets.ending), vec![4000003]);
        let interesting: Vec<i64> = buckets.interesting.iter().map(|(d, _)| d.id).collect();
        assert_eq!(interesting, vec![4000005, 4000001]);
        // 48% of 40 leaves 2 attestations to go.
        assert!(buckets.interesting[0].1);
        assert!(!buckets.interesting[1].1);
    }

    fn discussion(id: i64, approved_at: DateTime<Utc>, rate: f64) -> Discussion {
        serde_json::from_value(serde_json::json!({
            "id": id, "type": "grant", "title": format!("Discussion {id}"),
            "approved_at": approved_at.to_rfc3339(), "attestation": { "rate": rate }
        }))
        .unwrap()
    }

    #[test]
    fn discussion_age_boundaries() {
        let now = Utc::now();
        let thresholds = Thresholds::default();
        let days = |d: i64| now - chrono::Duration::days(d);
        let buckets = classify_discussions(
            &[
                discussion(1, days(90 - thresholds.ending_days), 0.0),
                discussion(2, days(90 - thresholds.ending_days) + chrono::Duration::seconds(1), 0.0),
                discussion(3, days(90) - chrono::Duration::seconds(1), 0.0),
                discussion(4, days(90), 0.0),
            ],
            now,
            &thresholds,
            40,
        );
        let ids = |v: &[Discussion]| v.iter().map(|d| d.id).collect::<Vec<_>>();
        assert_eq!(ids(&buckets.ending), vec![1]);
        assert_eq!(ids(&buckets.dead), vec![3]);
    }

    #[test]
    fn discussion_rate_boundaries() {
        let now = Utc::now();
        let thresholds = Thresholds::default();
        let fresh = now - chrono::Duration::days(1);
        let buckets = classify_discussions(
            &[
                discussion(1, fresh, thresholds.attestation_interest),
                discussion(2, fresh, thresholds.attestation_interest - 0.5),
                discussion(3, fresh, PROMOTION_RATE),
                discussion(4, fresh, PROMOTION_RATE - 0.5),
            ],
            now,
            &thresholds,
            40,
        );
        let interesting: Vec<i64> = buckets.interesting.iter().map(|(d, _)| d.id).collect();
        assert_eq!(interesting, vec![4, 1]);
    }

    #[tokio::test]
    async fn new_phase_entries_cover_both_phases() {
        let api = FakeApi::with_fixtures();
        let store = MemoryStore::default();
        let engine = engine_with(api, store);

        let selection = engine.new_phase_entries(ChatId::BROADCAST, None).await.unwrap();
        assert_eq!(selection.ids(Phase::Informal), vec![2000001, 2000002]);
        assert_eq!(selection.ids(Phase::Formal), vec![2000003]);
        assert!(selection.text.contains("2 new proposal"));
        assert!(selection.text.contains("1 new proposal"));
        for title in ["Simple proposal 1", "Simple proposal 2", "Simple proposal 3 in Formal"] {
            assert!(selection.text.contains(title), "{title}");
        }
        assert_eq!(
            selection.text,
            "🟦 __*2 new proposals* just entered _INFORMAL_:__\n\n\
             [\\#1000001](https://portal.devxdao.com/app/proposal/1000001) _simple_: \"Simple proposal 1\"\n\\(_0/40 voted_\\. _Time left: 23h 59m_\\)\n\n\
             [\\#1000002](https://portal.devxdao.com/app/proposal/1000002) _simple_: \"Simple proposal 2\"\n\\(_0/40 voted_\\. _Time left: 23h 55m_\\)\n\n\
             🟩 __*1 new proposal* just entered _FORMAL_:__\n\n\
             [\\#1000003](https://portal.devxdao.com/app/proposal/1000003) _simple_: \"Simple proposal 3 in Formal\"\n\\(_1/33 voted_\\. _Time left: 23h 55m_\\)\n\n"
        );
    }

    #[tokio::test]
    async fn selection_is_stable_until_delivery_is_recorded() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(FakeApi::with_fixtures(), store.clone());
        let chat = ChatId(77);

        let first = engine.new_phase_entries(chat, None).await.unwrap();
        let second = engine.new_phase_entries(chat, None).await.unwrap();
        assert_eq!(first, second);

        // A failed attempt does not suppress.
        store
            .record_delivery(PostKind::NewPhaseEntry, Outcome::Failure, Some(first.keys[0]), chat, Utc::now())
            .await
            .unwrap();
        assert_eq!(engine.new_phase_entries(chat, None).await.unwrap(), first);

        store
            .record_delivery(PostKind::NewPhaseEntry, Outcome::Success, Some(first.keys[0]), chat, Utc::now())
            .await
            .unwrap();
        let third = engine.new_phase_entries(chat, None).await.unwrap();
        assert_eq!(third.ids(Phase::Informal), vec![2000002]);
        assert_eq!(third.ids(Phase::Formal), vec![2000003]);

        // Other subscribers are unaffected.
        let other = engine.new_phase_entries(ChatId(78), None).await.unwrap();
        assert_eq!(other.vote_ids().len(), 3);
    }

    #[tokio::test]
    async fn watch_list_limits_new_entries() {
        let engine = engine_with(FakeApi::with_fixtures(), MemoryStore::default());
        let selection = engine
            .new_phase_entries(ChatId(5), Some(&[1000003]))
            .await
            .unwrap();
        assert_eq!(selection.vote_ids(), vec![2000003]);
        assert!(!selection.text.contains("INFORMAL"));
    }

    #[tokio::test]
    async fn failed_no_quorum_keeps_only_failed_votes() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(FakeApi::with_fixtures(), store.clone());
        let selection = engine.failed_no_quorum(ChatId::BROADCAST).await.unwrap();
        assert_eq!(selection.vote_ids(), vec![5000001]);
        assert_eq!(
            selection.text,
            "🔥 __*1 failed without a quorum:*__\n\n[\\#6000001](https://portal.devxdao.com/app/proposal/6000001) _simple_: \"Completed failed with no quorum\"\n\n"
        );

        store
            .record_delivery(
                PostKind::FailedNoQuorum,
                Outcome::Success,
                Some(selection.keys[0]),
                ChatId::BROADCAST,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(engine.failed_no_quorum(ChatId::BROADCAST).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expiring_alert_uses_the_shorter_threshold() {
        let api = FakeApi::with_fixtures();
        // Fixtures end in ~24h; only this one is inside the 6h window.
        api.push_vote(Phase::Informal, vote_json("simple", Phase::Informal, 0, None, "05:00:00"));
        let mut milestone = vote_json("milestone", Phase::Informal, 0, None, "05:00:00");
        milestone["id"] = serde_json::json!(9);
        api.push_vote(Phase::Informal, milestone);
        let engine = engine_with(api, MemoryStore::default());
        let selection = engine.expiring_no_quorum(ChatId::BROADCAST).await.unwrap();
        assert_eq!(selection.keys, vec![EntityKey::new(1, Phase::Informal)]);
        assert!(selection
            .text
            .starts_with("⌛ __*1 informal vote* without a quorum expires within 6h:__"));
    }

    #[tokio::test]
    async fn digest_contains_expected_sections() {
        let engine = engine_with(FakeApi::with_fixtures(), MemoryStore::default());
        let text = engine.digest(Utc::now()).await.unwrap();
        assert!(text.contains("Simple proposal 3 in Formal"));
        assert!(text.contains("*2 discussions* require attention"));
        assert!(text.contains("*1 discussion* is ending within 7 days"));
        assert!(text.contains("*1 discussion* older than 90 days"));

        let informal = text.find("informal votes* without a quorum").unwrap();
        let formal = text.find("formal vote* without a quorum").unwrap();
        let completed = text.find("completed within 24h").unwrap();
        let discussions = text.find("older than 90 days").unwrap();
        assert!(informal < formal && formal < completed && completed < discussions);
    }

    #[tokio::test]
    async fn empty_upstream_yields_empty_outputs() {
        let engine = engine_with(FakeApi::empty(), MemoryStore::default());
        assert_eq!(engine.digest(Utc::now()).await.unwrap(), "");
        assert_eq!(engine.active_list().await.unwrap(), "");
        assert_eq!(
            engine.new_phase_entries(ChatId::BROADCAST, None).await.unwrap(),
            Selection::default()
        );
        let failed = engine.failed_no_quorum(ChatId::BROADCAST).await.unwrap();
        assert_eq!(failed.text, "");
        assert!(failed.vote_ids().is_empty());
    }

    #[tokio::test]
    async fn active_list_shows_short_lived_votes_per_phase() {
        let engine = engine_with(FakeApi::with_fixtures(), MemoryStore::default());
        let text = engine.active_list().await.unwrap();
        assert!(text.contains("*2 informal SIMPLE votes* require attention"));
        assert!(text.contains("*1 formal SIMPLE vote* requires attention"));
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let api = FakeApi::with_fixtures();
        api.fail_next("boom");
        let engine = engine_with(api, MemoryStore::default());
        assert!(engine.digest(Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn proposal_lookup_respects_success_flag() {
        let api = FakeApi::with_fixtures();
        let engine = engine_with(api, MemoryStore::default());
        let found = engine.proposal(1000001).await.unwrap().unwrap();
        assert_eq!(found.title, "Simple proposal 1");
        assert!(engine.proposal(999).await.unwrap().is_none());
    }
}
