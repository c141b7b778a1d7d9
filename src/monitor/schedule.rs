use crate::domain::{TimeOfDay, ValidationError};
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::Serialize;
use std::str::FromStr;

/// When a monitoring job fires: every N minutes, or at fixed wall-clock times each day.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MonitorSchedule {
    #[serde(rename = "intervalMinutes")]
    Interval(u32),
    FixedTimes(Vec<TimeOfDay>),
}

impl MonitorSchedule {
    /// Fixed times win over an interval when both are given.
    pub fn from_parts(interval_minutes: u32, fixed_times: &[String]) -> Result<Self, ValidationError> {
        let fixed_times = fixed_times
            .iter()
            .map(|time| time.trim())
            .filter(|time| !time.is_empty())
            .map(TimeOfDay::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        if !fixed_times.is_empty() {
            return Ok(MonitorSchedule::FixedTimes(fixed_times));
        }

        match interval_minutes {
            0 => Err(ValidationError::InvalidInterval),
            minutes => Ok(MonitorSchedule::Interval(minutes)),
        }
    }

    /// Returns the first trigger strictly after `from`.
    ///
    /// For an interval `from` is the anchor, the job passes its previous trigger to keep a steady cadence. Fixed times
    /// are wall-clock times in `timezone`.
    pub fn next_after(&self, from: DateTime<Utc>, timezone: FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            MonitorSchedule::Interval(minutes) => from.checked_add_signed(TimeDelta::minutes(i64::from(*minutes))),
            MonitorSchedule::FixedTimes(times) => {
                let from = from.with_timezone(&timezone);
                times
                    .iter()
                    .filter_map(|time| cron::Schedule::from_str(&format!("0 {} {} * * *", time.minute, time.hour)).ok())
                    .filter_map(|schedule| schedule.after(&from).next())
                    .min()
                    .map(|datetime| datetime.with_timezone(&Utc))
            }
        }
    }

    /// Returns an iterator over every trigger after `from`.
    pub fn after(&self, from: DateTime<Utc>, timezone: FixedOffset) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        std::iter::successors(self.next_after(from, timezone), move |previous| self.next_after(*previous, timezone))
    }
}
