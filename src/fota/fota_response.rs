use serde::{Deserialize, Serialize};

pub const SUCCESS_CODE: i64 = 0;
/// Returned when a request carries more identifiers than the upstream is willing to handle.
pub const OVERSIZED_BATCH_CODE: i64 = 1003;

/// The envelope every FOTA endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub struct FotaResponse<T> {
    pub code: i64,
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> FotaResponse<T> {
    pub fn message(&self) -> String {
        self.msg.clone().unwrap_or_else(|| "<no message>".to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest<'a> {
    pub app_key: &'a str,
    pub secret: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenData {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDeviceStatusRequest<'a> {
    pub imei_list: &'a [String],
}
