use crate::domain::{DeviceStatusRecord, Timezones, extract_version, is_recently_online};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version marker for identifiers whose chunk failed without yielding any data.
pub const ERROR_MARKER: &str = "ERROR";
/// Version marker for identifiers missing from an otherwise successful response.
pub const NOT_FOUND_MARKER: &str = "NOT FOUND";

/// Whether a device runs the expected firmware. `Unknown` when no expected version was given.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionMatch {
    #[default]
    Unknown,
    Yes,
    No,
}

impl VersionMatch {
    pub fn compare(expected: &str, version: &str) -> Self {
        match expected {
            "" => VersionMatch::Unknown,
            expected if expected == version => VersionMatch::Yes,
            _ => VersionMatch::No,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub imei: String,
    pub version: String,
    #[serde(default, alias = "lastime")]
    pub last_seen: String,
    #[serde(default, rename = "online24h")]
    pub online_24h: bool,
    #[serde(default)]
    pub matches_expected: VersionMatch,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub self_check_param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_tag: Option<String>,
}

impl QueryResult {
    pub fn from_record(record: DeviceStatusRecord, expected_version: &str, now: DateTime<Utc>, timezones: &Timezones) -> Self {
        let version = extract_version(&record);
        let last_seen = record.last_seen().map(str::to_string).unwrap_or_default();

        QueryResult {
            online_24h: is_recently_online(Some(&last_seen), now, timezones),
            matches_expected: VersionMatch::compare(expected_version, &version),
            imei: record.imei,
            version,
            last_seen,
            mode: record.mode.unwrap_or_default(),
            self_check_param: record.self_check_param.unwrap_or_default(),
            status_tag: None,
        }
    }

    pub fn marker(imei: impl Into<String>, marker: &str, expected_version: &str) -> Self {
        QueryResult {
            imei: imei.into(),
            version: marker.to_string(),
            last_seen: String::new(),
            online_24h: false,
            matches_expected: VersionMatch::compare(expected_version, marker),
            mode: String::new(),
            self_check_param: String::new(),
            status_tag: None,
        }
    }

    /// False for the `ERROR` and `NOT FOUND` placeholders.
    pub fn has_data(&self) -> bool {
        self.version != ERROR_MARKER && self.version != NOT_FOUND_MARKER
    }
}

/// What a batch query hands back: one result per resolved identifier plus the identifiers nothing could be learned about.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub results: Vec<QueryResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_identifiers: Vec<String>,
}
