use chrono::{NaiveTime, Weekday};

/// Telegram chat id (numeric). Doubles as the subscriber key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl ChatId {
    /// Subscriber key under which default-channel deliveries are recorded.
    pub const BROADCAST: ChatId = ChatId(0);

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Voting stage of a proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Informal,
    Formal,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Informal, Phase::Formal];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Informal => "informal",
            Phase::Formal => "formal",
        }
    }

    /// Column value in `posts.vote_type`.
    pub fn as_i64(self) -> i64 {
        match self {
            Phase::Informal => 0,
            Phase::Formal => 1,
        }
    }
}

/// Kind of a posted notification, as stored in `posts.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PostKind {
    Digest,
    ActiveList,
    NewPhaseEntry,
    FailedNoQuorum,
    ExpiringNoQuorum,
}

impl PostKind {
    pub fn as_i64(self) -> i64 {
        match self {
            PostKind::Digest => 0,
            PostKind::ActiveList => 1,
            PostKind::NewPhaseEntry => 2,
            PostKind::FailedNoQuorum => 3,
            PostKind::ExpiringNoQuorum => 4,
        }
    }
}

/// Result of a delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_i64(self) -> i64 {
        match self {
            Outcome::Success => 1,
            Outcome::Failure => 0,
        }
    }
}

/// Composite identity of a vote in a given phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub vote_id: i64,
    pub phase: Phase,
}

impl EntityKey {
    pub fn new(vote_id: i64, phase: Phase) -> Self {
        Self { vote_id, phase }
    }
}

/// Subscriber preference category (`preferences.pref_type`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Digest,
    PhaseEntry,
    SpecificProposals,
    ExtraAlerts,
    General,
}

impl Category {
    /// Categories with a weekday calendar menu.
    pub const CALENDAR: [Category; 4] = [
        Category::Digest,
        Category::PhaseEntry,
        Category::SpecificProposals,
        Category::ExtraAlerts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Digest => "digest",
            Category::PhaseEntry => "new_proposals",
            Category::SpecificProposals => "proposals",
            Category::ExtraAlerts => "alerts",
            Category::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "digest" => Some(Category::Digest),
            "new_proposals" => Some(Category::PhaseEntry),
            "proposals" => Some(Category::SpecificProposals),
            "alerts" => Some(Category::ExtraAlerts),
            "general" => Some(Category::General),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::Digest => "DIGEST",
            Category::PhaseEntry => "NEW PROPOSALS",
            Category::SpecificProposals => "MY PROPOSALS",
            Category::ExtraAlerts => "EXTRA ALERTS",
            Category::General => "GENERAL",
        }
    }
}

/// Per-chat settings for one category. Absence of a stored row means `default()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preference {
    /// Indexed by `Weekday::num_days_from_sunday()`.
    pub weekdays: [bool; 7],
    /// Local delivery time; only meaningful for [`Category::Digest`].
    pub delivery_time: NaiveTime,
    /// Whole hours from UTC, -12..=12; only meaningful for [`Category::General`].
    pub timezone_offset: i32,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            weekdays: [false; 7],
            delivery_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap_or_default(),
            timezone_offset: 0,
        }
    }
}

impl Preference {
    pub fn is_enabled_on(&self, day: Weekday) -> bool {
        self.weekdays[day.num_days_from_sunday() as usize]
    }
}

/// A single field change applied with upsert semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreferenceUpdate {
    Weekday(Weekday, bool),
    DeliveryTime(NaiveTime),
    Timezone(i32),
}

/// Quorum constants fetched once per login.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuorumSettings {
    pub total_members: u32,
    /// Rate for `grant` and `admin-grant` votes.
    pub rate_grant: f64,
    pub rate_milestone: f64,
    pub rate_simple: f64,
}

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Two-letter label used on calendar buttons.
pub fn weekday_short(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "SU",
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
    }
}

pub fn weekday_column(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "sunday",
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_kind_column_values_are_distinct() {
        let values: std::collections::HashSet<i64> = [
            PostKind::Digest,
            PostKind::ActiveList,
            PostKind::NewPhaseEntry,
            PostKind::FailedNoQuorum,
            PostKind::ExpiringNoQuorum,
        ]
        .into_iter()
        .map(PostKind::as_i64)
        .collect();
        assert_eq!(values.len(), 5);
        assert_ne!(Phase::Informal.as_i64(), Phase::Formal.as_i64());
    }

    #[test]
    fn category_names_parse_back() {
        for c in Category::CALENDAR {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse("general"), Some(Category::General));
        assert_eq!(Category::parse("main"), None);
    }

    #[test]
    fn default_preference_is_all_off_at_three_pm() {
        let p = Preference::default();
        assert!(WEEKDAYS.iter().all(|d| !p.is_enabled_on(*d)));
        assert_eq!(p.delivery_time, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        assert_eq!(p.timezone_offset, 0);
    }
}
