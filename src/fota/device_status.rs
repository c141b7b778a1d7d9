use crate::app_config::Fota;
use crate::domain::DeviceStatusRecord;
use crate::fota::AuthToken;
use crate::fota::fota_response::{FotaResponse, OVERSIZED_BATCH_CODE, QueryDeviceStatusRequest, SUCCESS_CODE};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue, InvalidHeaderValue};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Fetches the status of a bounded list of devices in a single upstream call.
#[async_trait]
pub trait DeviceStatusFetcher: Send + Sync {
    async fn query_device_status(&self, token: &AuthToken, imeis: &[String]) -> Result<Vec<DeviceStatusRecord>, UpstreamError>;
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream answered with HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("upstream rejected the request with code {code}: {message}")]
    Api { code: i64, message: String },
    #[error("token is not a valid header value: {0}")]
    InvalidToken(#[from] InvalidHeaderValue),
}

impl UpstreamError {
    /// Whether the failure looks like the upstream choking on the request size or load, rather than rejecting it outright.
    pub fn is_overload(&self) -> bool {
        match self {
            UpstreamError::Request(e) => e.is_timeout() || e.is_connect(),
            UpstreamError::Http { status, .. } => status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS,
            UpstreamError::Api { code, .. } => *code == OVERSIZED_BATCH_CODE,
            UpstreamError::InvalidToken(_) => false,
        }
    }
}

#[derive(Debug)]
pub struct FotaClient {
    client: Client,
    url: String,
}

impl FotaClient {
    pub fn new(client: Client, config: &Fota) -> Self {
        FotaClient {
            client,
            url: config.url().to_string(),
        }
    }
}

#[async_trait]
impl DeviceStatusFetcher for FotaClient {
    #[instrument(skip_all, fields(imeis = imeis.len()))]
    async fn query_device_status(&self, token: &AuthToken, imeis: &[String]) -> Result<Vec<DeviceStatusRecord>, UpstreamError> {
        let mut authorization = HeaderValue::from_str(token.value())?;
        authorization.set_sensitive(true);

        let response = self
            .client
            .post(format!("{}/queryDeviceStatus", self.url))
            .header(AUTHORIZATION, authorization)
            .json(&QueryDeviceStatusRequest { imei_list: imeis })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status_code = %status, "⚠️ Device status request failed. Response: {:?}", body);
            return Err(UpstreamError::Http { status, body });
        }

        let body = response.json::<FotaResponse<Vec<DeviceStatusRecord>>>().await?;
        if body.code != SUCCESS_CODE {
            warn!(code = body.code, "⚠️ Device status request rejected, {}", body.message());
            return Err(UpstreamError::Api {
                code: body.code,
                message: body.message(),
            });
        }

        let records = body.data.unwrap_or_default();
        debug!("Received {} record(s) for {} IMEI(s)", records.len(), imeis.len());
        Ok(records)
    }
}
