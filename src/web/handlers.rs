use crate::domain::{QueryOutcome, QueryResult, ValidationError};
use crate::monitor::{MonitorRequest, MonitorStatus};
use crate::notify::{Email, EmailAttachment, notify_all, split_recipients};
use crate::report::{XLSX_CONTENT_TYPE, report_file_name};
use crate::web::AppState;
use crate::web::api_error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    imeis: Vec<String>,
    #[serde(default)]
    expected_version: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    recipient: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    results: Vec<QueryResult>,
}

/// Handle POST /api/query
pub async fn handle_query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> Result<Json<QueryOutcome>, ApiError> {
    let imeis = request
        .imeis
        .iter()
        .map(|imei| imei.trim())
        .filter(|imei| !imei.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    let outcome = state.controller.run(&imeis, request.expected_version.trim()).await?;
    Ok(Json(outcome))
}

/// Handle POST /api/export
pub async fn handle_export(State(state): State<AppState>, Json(request): Json<ExportRequest>) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let report = state.exporter.export(&request.results, now)?;
    let file_name = report_file_name(now, state.timezones.target());
    info!("📄 Exported {} result(s) to {}", request.results.len(), file_name);

    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        report,
    ))
}

/// Handle POST /api/monitor
pub async fn handle_monitor(State(state): State<AppState>, Json(request): Json<MonitorRequest>) -> Result<Json<Value>, ApiError> {
    state.monitor.activate(request).await?;
    Ok(Json(json!({ "active": true })))
}

/// Handle POST /api/monitor/stop
pub async fn handle_monitor_stop(State(state): State<AppState>) -> Json<Value> {
    state.monitor.deactivate().await;
    Json(json!({ "active": false }))
}

/// Handle GET /api/monitor/status
pub async fn handle_monitor_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.monitor.status().await)
}

/// Handle POST /api/email
pub async fn handle_email(State(state): State<AppState>, Json(request): Json<EmailRequest>) -> Result<Json<Value>, ApiError> {
    let recipients = split_recipients(&request.recipient);
    if recipients.is_empty() {
        return Err(ValidationError::MissingRecipients.into());
    }
    if request.subject.trim().is_empty() {
        return Err(ValidationError::MissingField("subject").into());
    }
    if request.body.trim().is_empty() {
        return Err(ValidationError::MissingField("body").into());
    }

    let now = Utc::now();
    let email = Email::new(request.subject, request.body).with_attachment(EmailAttachment {
        file_name: report_file_name(now, state.timezones.target()),
        content_type: XLSX_CONTENT_TYPE.to_string(),
        content: state.exporter.export(&request.results, now)?,
    });

    match notify_all(state.notifier.as_ref(), &recipients, &email).await {
        0 => Err(ApiError::Undelivered),
        sent => Ok(Json(json!({ "sent": sent }))),
    }
}
