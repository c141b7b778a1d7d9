mod client;
mod device_status;
mod fota_response;
mod token_cache;

pub use client::new_client;
pub use device_status::{DeviceStatusFetcher, FotaClient, UpstreamError};
pub use token_cache::{AuthError, AuthToken, TokenCache, TokenProvider};
