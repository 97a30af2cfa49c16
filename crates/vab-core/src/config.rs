use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::NaiveTime;

use crate::{errors::Error, Result};

/// Typed configuration, loaded once at startup from the environment
/// (optionally seeded from `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Chat transport
    pub bot_token: String,
    pub broadcast_chat_id: i64,
    pub message_limit: usize,
    pub action_delay: Duration,

    // Upstream API
    pub api: ApiConfig,

    // Links rendered into messages
    pub links: LinkConfig,

    // Notification rules
    pub thresholds: Thresholds,

    // Scheduling
    pub digest_time: NaiveTime,
    pub post_retry_window: Duration,
    pub check_interval: Duration,

    // Persistence
    pub database_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub url_prefix: String,
    pub login: String,
    pub password: String,
    pub request_timeout: Duration,
    pub informal_url: String,
    pub formal_url: String,
    pub completed_url: String,
    pub discussions_url: String,
    pub proposal_json_url: String,
}

#[derive(Clone, Debug, Default)]
pub struct LinkConfig {
    pub portal_url_prefix: String,
    pub proposal_url: String,
    pub topic_url: String,
}

impl LinkConfig {
    pub fn proposal(&self, id: i64) -> String {
        format!("{}{}{id}", self.portal_url_prefix, self.proposal_url)
    }

    pub fn topic(&self, id: i64) -> String {
        format!("{}{id}", self.topic_url)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    /// Ending-soon window for the digest.
    pub soon: Duration,
    /// Shorter window for immediate expiring alerts.
    pub expiring: Duration,
    /// Attestation percentage above which a discussion is interesting.
    pub attestation_interest: f64,
    /// Days before the 90-day cutoff when a discussion counts as ending.
    pub ending_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            soon: Duration::from_secs(24 * 3600),
            expiring: Duration::from_secs(6 * 3600),
            attestation_interest: 30.0,
            ending_days: 7,
        }
    }
}

impl Thresholds {
    pub fn soon_hours(&self) -> u64 {
        self.soon.as_secs() / 3600
    }

    pub fn expiring_hours(&self) -> u64 {
        self.expiring.as_secs() / 3600
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = required("BOT_TOKEN")?;
        let broadcast_chat_id = required("CHAT_ID")?
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::Config("CHAT_ID must be a numeric chat id".to_string()))?;

        let api = ApiConfig {
            url_prefix: required("API_URL_PREFIX")?,
            login: required("LOGIN")?,
            password: required("PASSWORD")?,
            request_timeout: Duration::from_millis(env_u64("REQUEST_TIMEOUT").unwrap_or(10_000)),
            informal_url: required("INFORMAL_SORTED_URL")?,
            formal_url: required("FORMAL_SORTED_URL")?,
            completed_url: required("COMPLETED_SORTED_URL")?,
            discussions_url: required("DISCUSSIONS_URL")?,
            proposal_json_url: required("JSON_PROPOSAL_URL")?,
        };

        let links = LinkConfig {
            portal_url_prefix: required("PORTAL_URL_PREFIX")?,
            proposal_url: required("PROPOSAL_URL")?,
            topic_url: env_str("TOPIC_URL").unwrap_or_default(),
        };

        let thresholds = Thresholds {
            soon: hours(env_u64("SOON_TIMESPAN").unwrap_or(24)),
            expiring: hours(env_u64("EXPIRING_TIMESPAN").unwrap_or(6)),
            attestation_interest: env_f64("ATTESTATION_INTEREST").unwrap_or(30.0),
            ending_days: env_u64("ENDING_DAYS").unwrap_or(7) as i64,
        };
        if thresholds.expiring >= thresholds.soon {
            return Err(Error::Config(
                "EXPIRING_TIMESPAN must be shorter than SOON_TIMESPAN".to_string(),
            ));
        }
        if thresholds.ending_days <= 0 || thresholds.ending_days >= 90 {
            return Err(Error::Config("ENDING_DAYS must be within 1..89".to_string()));
        }

        let digest_h = env_u32("DIGEST_TIME_H").unwrap_or(15);
        let digest_m = env_u32("DIGEST_TIME_M").unwrap_or(0);
        let digest_time = NaiveTime::from_hms_opt(digest_h, digest_m, 0).ok_or_else(|| {
            Error::Config(format!("invalid digest time {digest_h}:{digest_m}"))
        })?;

        let post_retry_window = minutes(env_u64("POST_RETRY_TIME").unwrap_or(30));
        let check_interval = minutes(env_u64("CHECK_INTERVAL").unwrap_or(1).max(1));
        if post_retry_window >= hours(12) {
            return Err(Error::Config(
                "POST_RETRY_TIME must be shorter than 12 hours".to_string(),
            ));
        }

        Ok(Self {
            bot_token,
            broadcast_chat_id,
            message_limit: env_usize("TELEGRAM_MESSAGE_LIMIT").unwrap_or(4095),
            action_delay: Duration::from_millis(env_u64("ACTION_DELAY_MS").unwrap_or(400)),
            api,
            links,
            thresholds,
            digest_time,
            post_retry_window,
            check_interval,
            database_path: database_path(),
        })
    }
}

/// SQLite file location; usable without loading the full config (migration runner).
pub fn database_path() -> PathBuf {
    load_dotenv_if_present(Path::new(".env"));
    env::var_os("DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("vab.db"))
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 3600)
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let Some((key, val)) = parse_dotenv_line(raw) else {
            continue;
        };
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv_line(raw: &str) -> Option<(String, String)> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (k, v) = line.split_once('=')?;
    let key = k.trim();
    if key.is_empty() {
        return None;
    }

    let mut val = v.trim().to_string();
    // Strip optional surrounding quotes.
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        val = val[1..val.len() - 1].to_string();
    }

    Some((key.to_string(), val))
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    env_str(key).and_then(|s| s.trim().parse::<f64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
