mod api_error;
mod handlers;

use crate::batch::BatchController;
use crate::domain::Timezones;
use crate::monitor::Monitor;
use crate::notify::Notifier;
use crate::report::ReportExporter;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<BatchController>,
    pub exporter: Arc<dyn ReportExporter>,
    pub notifier: Arc<dyn Notifier>,
    pub monitor: Arc<Monitor>,
    pub timezones: Timezones,
}

pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(port: u16, state: AppState) -> Self {
        Server { port, state }
    }

    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            .route("/api/query", post(handlers::handle_query))
            .route("/api/export", post(handlers::handle_export))
            .route("/api/monitor", post(handlers::handle_monitor))
            .route("/api/monitor/stop", post(handlers::handle_monitor_stop))
            .route("/api/monitor/status", get(handlers::handle_monitor_status))
            .route("/api/email", post(handlers::handle_email))
            .layer(cors)
            .layer(DefaultBodyLimit::max(BODY_LIMIT))
            .with_state(self.state.clone())
    }

    pub async fn start(&self) -> Result<(), std::io::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("🌐 Listening on {}", addr);
        axum::serve(listener, self.routes()).await
    }
}
