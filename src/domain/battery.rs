use regex::Regex;
use std::sync::LazyLock;

static BATTERY_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"vBat=\d+mV\((\d+)%\)").expect("valid battery pattern"));

/// Returns the battery charge embedded in a self-check string as `"82%"`, or `"-"` when there is none.
pub fn battery_percentage(self_check_param: &str) -> String {
    BATTERY_TOKEN
        .captures(self_check_param)
        .and_then(|captures| captures.get(1))
        .map(|percentage| format!("{}%", percentage.as_str()))
        .unwrap_or_else(|| "-".to_string())
}
