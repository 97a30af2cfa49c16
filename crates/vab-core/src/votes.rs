//! Upstream vote / discussion records as returned by the voting API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::domain::{EntityKey, Phase};

/// Proposal content type. Unknown upstream values are kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "Option<String>")]
pub enum ContentType {
    Simple,
    Grant,
    AdminGrant,
    Milestone,
    #[default]
    Unknown,
    Other(String),
}

impl From<Option<String>> for ContentType {
    fn from(v: Option<String>) -> Self {
        match v.as_deref() {
            Some("simple") => ContentType::Simple,
            Some("grant") => ContentType::Grant,
            Some("admin-grant") => ContentType::AdminGrant,
            Some("milestone") => ContentType::Milestone,
            Some(other) => ContentType::Other(other.to_string()),
            None => ContentType::Unknown,
        }
    }
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Simple => "simple",
            ContentType::Grant => "grant",
            ContentType::AdminGrant => "admin-grant",
            ContentType::Milestone => "milestone",
            ContentType::Unknown => "",
            ContentType::Other(s) => s,
        }
    }

    /// Short-lived votes that get the expiring alerts and the active list.
    pub fn is_short_lived(&self) -> bool {
        matches!(self, ContentType::Simple | ContentType::AdminGrant)
    }
}

/// Final result of a completed vote.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum VoteResult {
    Pending,
    Passed,
    NoQuorum,
    Other(String),
}

impl From<String> for VoteResult {
    fn from(v: String) -> Self {
        match v.as_str() {
            "pending" => VoteResult::Pending,
            "passed" => VoteResult::Passed,
            "no-quorum" => VoteResult::NoQuorum,
            _ => VoteResult::Other(v),
        }
    }
}

impl VoteResult {
    pub fn as_str(&self) -> &str {
        match self {
            VoteResult::Pending => "pending",
            VoteResult::Passed => "passed",
            VoteResult::NoQuorum => "no-quorum",
            VoteResult::Other(s) => s,
        }
    }
}

/// One active or completed vote.
#[derive(Clone, Debug, Deserialize)]
pub struct Vote {
    pub id: i64,
    #[serde(rename = "proposalId")]
    pub proposal_id: i64,
    #[serde(default, deserialize_with = "string_or_default")]
    pub title: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(rename = "type", default, deserialize_with = "phase_or_default")]
    pub phase: Phase,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub result_count: u32,
    /// Formal voting pool (only informal voters).
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub total_member: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub total_user_va: Option<u32>,
    /// `HH:MM:SS` until the phase ends.
    #[serde(rename = "timeLeft", default)]
    pub time_left: Option<String>,
    #[serde(default)]
    pub result: Option<VoteResult>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Vote {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.id, self.phase)
    }

    pub fn time_left(&self) -> Option<Duration> {
        self.time_left.as_deref().and_then(parse_time_left)
    }

    /// Vote total shown next to the result count.
    pub fn displayed_total(&self) -> Option<u32> {
        self.total_member
            .filter(|n| *n > 0)
            .or(self.total_user_va)
    }

    pub fn is_no_quorum(&self) -> bool {
        self.result == Some(VoteResult::NoQuorum)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Attestation {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rate: f64,
}

/// A proposal in the pre-vote discussion / attestation stage.
#[derive(Clone, Debug, Deserialize)]
pub struct Discussion {
    pub id: i64,
    #[serde(default, deserialize_with = "string_or_default")]
    pub title: String,
    #[serde(rename = "type", default, deserialize_with = "string_or_default")]
    pub discussion_type: String,
    pub approved_at: DateTime<Utc>,
    #[serde(default)]
    pub attestation: Attestation,
    #[serde(default)]
    pub discourse_topic_id: Option<i64>,
}

impl Discussion {
    pub fn attestation_rate(&self) -> f64 {
        self.attestation.rate
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProposalSummary {
    #[serde(default, deserialize_with = "string_or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub short_description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VotesEnvelope {
    #[serde(default)]
    pub votes: Vec<Vote>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DiscussionsEnvelope {
    #[serde(default)]
    pub proposals: Vec<Discussion>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProposalEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub proposal: Option<ProposalSummary>,
}

/// Parse `HH:MM[:SS]` into a duration. Hours may exceed 24.
pub fn parse_time_left(s: &str) -> Option<Duration> {
    let mut parts = s.trim().split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let sec: u64 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || m >= 60 || sec >= 60 {
        return None;
    }
    let secs = h.checked_mul(3600)?.checked_add(m * 60 + sec)?;
    Some(Duration::from_secs(secs))
}

fn string_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn phase_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<Phase, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(match raw.as_deref() {
        Some("formal") => Phase::Formal,
        _ => Phase::Informal,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw = Option::<NumberOrString>::deserialize(d)?;
    Ok(raw.and_then(|v| v.as_f64()).unwrap_or(0.0))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(lenient_opt_u32(d)?.unwrap_or(0))
}

fn lenient_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let raw = Option::<NumberOrString>::deserialize(d)?;
    Ok(raw
        .and_then(|v| v.as_f64())
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32))
}
