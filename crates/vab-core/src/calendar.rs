//! Time-of-day and weekday rules for scheduled deliveries.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Utc};

use crate::domain::{Category, Preference};

/// Outcome of the preference check for one subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Never,
    Now,
    /// Due, unless a successful delivery happened after this instant.
    UnlessDeliveredSince(DateTime<Utc>),
}

/// Start of the look-back `window` ending at `now`.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Wall-clock time for a whole-hour UTC offset.
pub fn local_time(now: DateTime<Utc>, offset_hours: i32) -> NaiveDateTime {
    now.naive_utc() + chrono::Duration::hours(offset_hours as i64)
}

/// Start of the daily slot `[at, at + window)` containing `local`, if any.
///
/// A slot that starts late in the evening may spill past midnight, so the
/// previous day's slot is checked too.
pub fn slot_start(local: NaiveDateTime, at: NaiveTime, window: Duration) -> Option<NaiveDateTime> {
    let window = chrono::Duration::from_std(window).ok()?;
    let today = local.date().and_time(at);
    let yesterday = today - chrono::Duration::days(1);
    [today, yesterday]
        .into_iter()
        .find(|start| local >= *start && local < *start + window)
}

/// Preference check for `category` at `now`.
pub fn eligibility(
    category: Category,
    pref: &Preference,
    offset_hours: i32,
    now: DateTime<Utc>,
    retry_window: Duration,
) -> Eligibility {
    let local = local_time(now, offset_hours);

    if category != Category::Digest {
        return if pref.is_enabled_on(local.weekday()) {
            Eligibility::Now
        } else {
            Eligibility::Never
        };
    }

    let Some(start) = slot_start(local, pref.delivery_time, retry_window) else {
        return Eligibility::Never;
    };
    if !pref.is_enabled_on(start.weekday()) {
        return Eligibility::Never;
    }

    // "Today" is the local day the slot belongs to.
    let since_midnight = local - start.date().and_time(NaiveTime::MIN);
    Eligibility::UnlessDeliveredSince(now - since_midnight)
}
