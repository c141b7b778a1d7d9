use crate::domain::DeviceStatusRecord;
use regex::Regex;
use std::sync::LazyLock;

static VERSION_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"VERSION:([^;]+)").expect("valid version pattern"));

/// Returns the firmware version of a device, or an empty string when the record carries none.
///
/// The direct `version` field wins unless it holds the literal `"null"` the upstream sends for unknown values,
/// in which case the `VERSION:<value>;` token of the self-check diagnostic string is used.
pub fn extract_version(record: &DeviceStatusRecord) -> String {
    if let Some(version) = record.version.as_deref().filter(|version| !version.is_empty() && *version != "null") {
        return version.to_string();
    }

    record
        .self_check_param
        .as_deref()
        .and_then(|param| VERSION_TOKEN.captures(param))
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn record(version: Option<&str>, self_check_param: Option<&str>) -> DeviceStatusRecord {
        DeviceStatusRecord {
            imei: "860000000000001".to_string(),
            version: version.map(str::to_string),
            self_check_param: self_check_param.map(str::to_string),
            ..Default::default()
        }
    }

    #[rstest]
    #[case::direct_version(Some("2.0.1"), Some("VERSION:1.0.0;"), "2.0.1")]
    #[case::null_sentinel(Some("null"), Some("ICCID:123;VERSION:1.2.3;vBat=3950mV(82%)"), "1.2.3")]
    #[case::missing_version(None, Some("VERSION:1.2.3;"), "1.2.3")]
    #[case::unterminated_token(None, Some("VERSION:1.2.3"), "1.2.3")]
    #[case::empty_version(Some(""), Some("VERSION:1.2.3;"), "1.2.3")]
    #[case::no_token(Some("null"), Some("vBat=3950mV(82%)"), "")]
    #[case::nothing(None, None, "")]
    fn extracts_the_version(#[case] version: Option<&str>, #[case] self_check_param: Option<&str>, #[case] expected: &str) {
        assert_eq!(extract_version(&record(version, self_check_param)), expected);
    }

    #[test]
    fn extraction_is_idempotent() {
        let record = record(Some("null"), Some("VERSION:1.2.3;"));
        assert_eq!(extract_version(&record), extract_version(&record));
    }
}
