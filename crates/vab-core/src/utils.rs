//! Parsers for free-text replies in the interactive menu.

use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::{errors::Error, Result};

pub const TIMEZONE_RANGE: std::ops::RangeInclusive<i32> = -12..=12;

fn delivery_time_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{2}):(\d{2})$"))
        .as_ref()
        .map_err(|e| Error::External(e.to_string()))
}

/// Strict `hh:mm`, 24-hour clock.
pub fn parse_delivery_time(text: &str) -> Result<NaiveTime> {
    let invalid = || Error::Validation("Incorrect time format. Please use hh:mm, e.g. 09:30.".to_string());
    let caps = delivery_time_pattern()?
        .captures(text.trim())
        .ok_or_else(invalid)?;
    let h: u32 = caps[1].parse().map_err(|_| invalid())?;
    let m: u32 = caps[2].parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(h, m, 0).ok_or_else(invalid)
}

/// Whole-hour UTC offset within -12..=12.
pub fn parse_timezone_offset(text: &str) -> Result<i32> {
    let offset: i32 = text.trim().parse().map_err(|_| {
        Error::Validation("Incorrect timezone offset. Send a whole number from -12 to 12.".to_string())
    })?;
    if !TIMEZONE_RANGE.contains(&offset) {
        return Err(Error::Validation(
            "Timezone offset must be between -12 and 12.".to_string(),
        ));
    }
    Ok(offset)
}

/// Non-negative proposal number, optionally prefixed with `#`.
pub fn parse_proposal_id(text: &str) -> Result<i64> {
    text.trim()
        .trim_start_matches('#')
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 0)
        .ok_or_else(|| Error::Validation("Incorrect proposal number.".to_string()))
}
