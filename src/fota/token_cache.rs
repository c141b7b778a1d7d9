use crate::app_config::Fota;
use crate::fota::fota_response::{FotaResponse, SUCCESS_CODE, TokenData, TokenRequest};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, PartialEq, Debug)]
pub struct AuthToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        AuthToken {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>, renewal_skew: TimeDelta) -> bool {
        self.expires_at.checked_sub_signed(renewal_skew).is_some_and(|renew_at| now < renew_at)
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token endpoint answered with HTTP {0}")]
    Http(StatusCode),
    #[error("token endpoint rejected the credentials with code {code}: {message}")]
    Rejected { code: i64, message: String },
    #[error("token endpoint did not return a token")]
    MissingToken,
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<AuthToken, AuthError>;
}

/// Exchanges the application credentials for a token and keeps it until it is about to expire.
///
/// The upstream does not reliably report a lifetime, so every token is assumed to live for the configured TTL.
/// Renewals hold the lock for the whole exchange, concurrent callers wait for it instead of racing it.
#[derive(Debug)]
pub struct TokenCache {
    client: Client,
    url: String,
    app_key: String,
    secret: String,
    ttl: TimeDelta,
    renewal_skew: TimeDelta,
    cached: Mutex<Option<AuthToken>>,
}

impl TokenCache {
    pub fn new(client: Client, config: &Fota) -> Self {
        TokenCache {
            client,
            url: config.url().to_string(),
            app_key: config.app_key().to_string(),
            secret: config.secret().to_string(),
            ttl: to_time_delta(config.token_ttl()),
            renewal_skew: to_time_delta(config.token_renewal_skew()),
            cached: Mutex::new(None),
        }
    }

    pub async fn token_at(&self, now: DateTime<Utc>) -> Result<AuthToken, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|token| token.is_usable_at(now, self.renewal_skew)) {
            debug!(expires_at = %token.expires_at(), "🔑 Using cached token");
            return Ok(token.clone());
        }

        *cached = None;
        let token = self.exchange(now).await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    #[instrument(skip_all)]
    async fn exchange(&self, now: DateTime<Utc>) -> Result<AuthToken, AuthError> {
        info!("🔑 Requesting token...");

        let request = TokenRequest {
            app_key: &self.app_key,
            secret: &self.secret,
        };
        let response = self
            .client
            .post(format!("{}/token", self.url))
            .json(&request)
            .send()
            .await
            .inspect_err(|e| warn!("🔑 Requesting token... failed, {}", e))?;

        if !response.status().is_success() {
            warn!(status_code = %response.status(), "🔑 Requesting token... failed");
            return Err(AuthError::Http(response.status()));
        }

        let body = response.json::<FotaResponse<TokenData>>().await?;
        if body.code != SUCCESS_CODE {
            warn!(code = body.code, "🔑 Requesting token... rejected, {}", body.message());
            return Err(AuthError::Rejected {
                code: body.code,
                message: body.message(),
            });
        }

        let token = body
            .data
            .and_then(|data| data.token)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let token = AuthToken::new(token, now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC));
        info!(expires_at = %token.expires_at(), "🔑 Requesting token... OK");
        Ok(token)
    }

    #[cfg(test)]
    async fn cached(&self) -> Option<AuthToken> {
        self.cached.lock().await.clone()
    }
}

#[async_trait]
impl TokenProvider for TokenCache {
    async fn token(&self) -> Result<AuthToken, AuthError> {
        self.token_at(Utc::now()).await
    }
}

fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
