use crate::domain::Timezones;
use chrono::{DateTime, TimeDelta, Utc};

fn recency_window() -> TimeDelta {
    TimeDelta::hours(24)
}

/// Returns whether a device reported within the last 24 hours, boundary included.
///
/// `last_seen` is a source timezone wall-clock timestamp; the comparison happens in the target timezone.
/// Missing or unparseable timestamps never count as recent.
pub fn is_recently_online(last_seen: Option<&str>, now: DateTime<Utc>, timezones: &Timezones) -> bool {
    let Some(last_seen) = last_seen.and_then(|value| timezones.parse_last_seen(value)) else {
        return false;
    };

    let now = now.with_timezone(&timezones.target());
    now.signed_duration_since(last_seen) <= recency_window()
}
