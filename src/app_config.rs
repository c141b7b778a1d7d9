use crate::batch::BatchPolicy;
use crate::domain::Timezones;
use config::{Config, ConfigError};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    server: Server,
    fota: Fota,
    batch: Batch,
    timezones: TimezoneOffsets,
    email: Email,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(config::File::with_name("config_local").required(false))
            .add_source(config::Environment::with_prefix("FOTA_MONITOR").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn fota(&self) -> &Fota {
        &self.fota
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.batch.batch_size.max(1),
            sub_batch_size: self.batch.sub_batch_size.max(1),
            batch_delay: self.batch.batch_delay,
            retry_delay: self.batch.retry_delay,
        }
    }

    pub fn timezones(&self) -> Result<Timezones, ConfigError> {
        Timezones::from_offset_hours(self.timezones.source_offset_hours, self.timezones.target_offset_hours)
            .ok_or_else(|| ConfigError::Message("timezone offsets must be between -23 and 23 hours".to_string()))
    }

    pub fn email(&self) -> &Email {
        &self.email
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    port: u16,
}

impl Server {
    pub fn port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Deserialize)]
pub struct Fota {
    url: String,
    app_key: String,
    secret: String,
    #[serde(with = "humantime_serde")]
    request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    token_ttl: Duration,
    #[serde(with = "humantime_serde")]
    token_renewal_skew: Duration,
}

impl Fota {
    pub fn url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn token_renewal_skew(&self) -> Duration {
        self.token_renewal_skew
    }
}

#[derive(Debug, Deserialize)]
struct Batch {
    batch_size: usize,
    sub_batch_size: usize,
    #[serde(with = "humantime_serde")]
    batch_delay: Duration,
    #[serde(with = "humantime_serde")]
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct TimezoneOffsets {
    source_offset_hours: i32,
    target_offset_hours: i32,
}

#[derive(Debug, Deserialize)]
pub struct Email {
    smtp_host: String,
    smtp_port: u16,
    username: String,
    password: String,
    from: String,
}

impl Email {
    pub fn smtp_host(&self) -> &str {
        &self.smtp_host
    }

    pub fn smtp_port(&self) -> u16 {
        self.smtp_port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn from(&self) -> &str {
        &self.from
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                server: Server { port: 3001 },
                fota: Fota {
                    url: "https://fota.url".to_string(),
                    app_key: "app-key".to_string(),
                    secret: "secret".to_string(),
                    request_timeout: Duration::from_secs(5),
                    token_ttl: Duration::from_secs(3600),
                    token_renewal_skew: Duration::from_secs(300),
                },
                batch: Batch {
                    batch_size: 50,
                    sub_batch_size: 10,
                    batch_delay: Duration::ZERO,
                    retry_delay: Duration::ZERO,
                },
                timezones: TimezoneOffsets {
                    source_offset_hours: 8,
                    target_offset_hours: -3,
                },
                email: Email {
                    smtp_host: "localhost".to_string(),
                    smtp_port: 587,
                    username: "user".to_string(),
                    password: "password".to_string(),
                    from: "reports@example.com".to_string(),
                },
            },
        }
    }

    pub fn fota_url(mut self, url: String) -> Self {
        self.config.fota.url = url;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch.batch_size = batch_size;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
