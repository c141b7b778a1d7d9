use crate::app_config::AppConfig;
use crate::batch::BatchController;
use crate::fota::{FotaClient, TokenCache};
use crate::monitor::{Monitor, MonitorCycle};
use crate::notify::{Notifier, SmtpNotifier};
use crate::report::{ReportExporter, XlsxExporter};
use crate::web::{AppState, Server};
use std::sync::Arc;
use tracing::info;

mod app_config;
mod batch;
mod domain;
mod extensions;
mod fota;
mod monitor;
mod notify;
mod report;
mod web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    let timezones = config.timezones()?;
    info!("✅  Loaded configuration");

    let client = fota::new_client(&config)?;
    let controller = Arc::new(BatchController::new(
        Arc::new(TokenCache::new(client.clone(), config.fota())),
        Arc::new(FotaClient::new(client, config.fota())),
        config.batch_policy(),
        timezones,
    ));
    info!("✅  Initialized FOTA client for {}", config.fota().url());

    let exporter: Arc<dyn ReportExporter> = Arc::new(XlsxExporter::new(timezones));
    let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::new(config.email())?);
    info!("✅  Initialized SMTP notifier for {}", config.email().smtp_host());

    let monitor = Arc::new(Monitor::new(MonitorCycle::new(controller.clone(), exporter.clone(), notifier.clone(), timezones)));

    let server = Server::new(
        config.server().port(),
        AppState {
            controller,
            exporter,
            notifier,
            monitor,
            timezones,
        },
    );

    info!("🔥 {} is up and running", env!("CARGO_PKG_NAME"));
    server.start().await?;

    Ok(())
}
