use serde::de::{Error, Unexpected};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// A wall-clock time in `HH:MM` format.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseTimeOfDayError {
    #[error("'{0}' is not a time in HH:MM format")]
    InvalidFormat(String),
    #[error("'{0}' is not a valid hour between 0 and 23")]
    InvalidHour(String),
    #[error("'{0}' is not a valid minute between 0 and 59")]
    InvalidMinute(String),
}

impl FromStr for TimeOfDay {
    type Err = ParseTimeOfDayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let Some((hour, minute)) = value.split_once(':') else {
            return Err(ParseTimeOfDayError::InvalidFormat(value.to_string()));
        };

        let hour = hour
            .parse::<u8>()
            .ok()
            .filter(|hour| *hour <= 23)
            .ok_or_else(|| ParseTimeOfDayError::InvalidHour(hour.to_string()))?;

        if minute.len() != 2 {
            return Err(ParseTimeOfDayError::InvalidMinute(minute.to_string()));
        }

        let minute = minute
            .parse::<u8>()
            .ok()
            .filter(|minute| *minute <= 59)
            .ok_or_else(|| ParseTimeOfDayError::InvalidMinute(minute.to_string()))?;

        Ok(TimeOfDay { hour, minute })
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        TimeOfDay::from_str(&value).map_err(|_| Error::invalid_value(Unexpected::Str(&value), &"a time in HH:MM format"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
