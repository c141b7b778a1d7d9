use crate::app_config::AppConfig;
use reqwest::header::HeaderValue;
use reqwest::{Client, header};
use thiserror::Error;

/// Builds the HTTP client shared by the token cache and the device status fetcher.
///
/// The timeout applies to every individual call; batch jobs as a whole are never timed out.
pub fn new_client(config: &AppConfig) -> Result<Client, FotaClientError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    let client = Client::builder()
        .timeout(config.fota().request_timeout())
        .default_headers(headers)
        .build()?;
    Ok(client)
}

#[derive(Error, Debug)]
pub enum FotaClientError {
    #[error("request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppConfigBuilder;

    #[tokio::test]
    async fn new_client_accepts_json() -> Result<(), FotaClientError> {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .match_header("accept", "application/json")
            .create_async()
            .await;

        let config = AppConfigBuilder::new().fota_url(server.url()).build();
        let client = new_client(&config)?;

        client.post(format!("{}/token", config.fota().url())).send().await?;

        mock.assert_async().await;

        Ok(())
    }
}
