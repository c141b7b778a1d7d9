use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A single device entry as returned by `/queryDeviceStatus`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusRecord {
    pub imei: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub self_check_param: Option<String>,
    #[serde(default)]
    pub lastime: Option<String>,
    #[serde(default)]
    pub last_time: Option<String>,
    #[serde(default, deserialize_with = "opaque_code")]
    pub mode: Option<String>,
}

impl DeviceStatusRecord {
    /// The upstream spells the last seen field two different ways depending on the firmware.
    pub fn last_seen(&self) -> Option<&str> {
        [self.lastime.as_deref(), self.last_time.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
    }
}

fn opaque_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(code)) => Some(code),
        Some(other) => Some(other.to_string()),
    })
}
