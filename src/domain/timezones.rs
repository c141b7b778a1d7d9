use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

const LAST_SEEN_FORMATS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// The timezone the upstream reports in and the timezone every report is read in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timezones {
    source: FixedOffset,
    target: FixedOffset,
}

impl Timezones {
    pub fn from_offset_hours(source: i32, target: i32) -> Option<Self> {
        Some(Timezones {
            source: FixedOffset::east_opt(source.checked_mul(3600)?)?,
            target: FixedOffset::east_opt(target.checked_mul(3600)?)?,
        })
    }

    pub fn target(&self) -> FixedOffset {
        self.target
    }

    /// Parses an upstream timestamp and returns it in the target timezone.
    ///
    /// Timestamps without an offset are wall-clock times in the source timezone.
    pub fn parse_last_seen(&self, value: &str) -> Option<DateTime<FixedOffset>> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
            return Some(datetime.with_timezone(&self.target));
        }

        LAST_SEEN_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .and_then(|naive| self.source.from_local_datetime(&naive).single())
            .map(|datetime| datetime.with_timezone(&self.target))
    }
}

impl Default for Timezones {
    fn default() -> Self {
        Timezones::from_offset_hours(8, -3).expect("valid default offsets")
    }
}
