use crate::batch::{BatchController, BatchError};
use crate::domain::{QueryResult, Timezones, ValidationError};
use crate::extensions::date_time_ext::{ReportFormat, offset_label};
use crate::monitor::changes::{Snapshot, VersionChange, detect_changes, next_snapshot};
use crate::monitor::schedule::MonitorSchedule;
use crate::notify::{Email, EmailAttachment, Notifier, notify_all, split_recipients};
use crate::report::{ReportError, ReportExporter, XLSX_CONTENT_TYPE, report_file_name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_INTERVAL_MINUTES: u32 = 60;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// A request to start monitoring, as received from a client.
///
/// Recipients and fixed times may be sent as a list or as a single `,`/`;` separated string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRequest {
    #[serde(default)]
    pub imeis: Vec<String>,
    #[serde(default)]
    pub expected_version: String,
    #[serde(default, deserialize_with = "delimited")]
    pub recipients: Vec<String>,
    #[serde(default = "default_interval_minutes", alias = "interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default, alias = "fixed_times", deserialize_with = "delimited")]
    pub fixed_times: Vec<String>,
}

fn default_interval_minutes() -> u32 {
    DEFAULT_INTERVAL_MINUTES
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn delimited<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => vec![],
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    };
    Ok(values.iter().flat_map(|value| split_recipients(value)).collect())
}

/// What an active monitor watches, plus the versions it saw last time.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub imeis: Vec<String>,
    pub expected_version: String,
    pub recipients: Vec<String>,
    #[serde(flatten)]
    pub schedule: MonitorSchedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub snapshot: Snapshot,
}

impl TryFrom<MonitorRequest> for MonitorConfig {
    type Error = ValidationError;

    fn try_from(request: MonitorRequest) -> Result<Self, Self::Error> {
        let imeis = request
            .imeis
            .iter()
            .map(|imei| imei.trim())
            .filter(|imei| !imei.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if imeis.is_empty() {
            return Err(ValidationError::MissingIdentifiers);
        }

        let expected_version = request.expected_version.trim();
        if expected_version.is_empty() {
            return Err(ValidationError::MissingExpectedVersion);
        }

        Ok(MonitorConfig {
            imeis,
            expected_version: expected_version.to_string(),
            recipients: request.recipients,
            schedule: MonitorSchedule::from_parts(request.interval_minutes, &request.fixed_times)?,
            last_run_at: None,
            snapshot: Snapshot::new(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MonitorStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<MonitorConfig>,
}

/// Runs one monitoring pass: query, compare with the last pass and report changes.
pub struct MonitorCycle {
    controller: Arc<BatchController>,
    exporter: Arc<dyn ReportExporter>,
    notifier: Arc<dyn Notifier>,
    timezones: Timezones,
}

impl MonitorCycle {
    pub fn new(controller: Arc<BatchController>, exporter: Arc<dyn ReportExporter>, notifier: Arc<dyn Notifier>, timezones: Timezones) -> Self {
        MonitorCycle {
            controller,
            exporter,
            notifier,
            timezones,
        }
    }

    /// Returns the detected changes.
    ///
    /// The snapshot is committed only after the change report is built.
    #[instrument(skip_all)]
    pub async fn run(&self, config: &RwLock<MonitorConfig>) -> Result<Vec<VersionChange>, MonitorError> {
        let (imeis, expected_version) = {
            let config = config.read().await;
            (config.imeis.clone(), config.expected_version.clone())
        };

        info!("🔎 Running firmware check for {} IMEI(s)...", imeis.len());
        let outcome = self.controller.run(&imeis, &expected_version).await?;
        let now = Utc::now();

        let (changes, snapshot, recipients) = {
            let config = config.read().await;
            (
                detect_changes(&config.snapshot, &outcome.results),
                next_snapshot(&config.snapshot, &outcome.results),
                config.recipients.clone(),
            )
        };

        let email = match changes.is_empty() || recipients.is_empty() {
            true => None,
            false => Some(self.change_report(&outcome.results, &changes, now)?),
        };

        {
            let mut config = config.write().await;
            config.snapshot = snapshot;
            config.last_run_at = Some(now);
        }

        if changes.is_empty() {
            info!("🔎 Running firmware check for {} IMEI(s)... OK, no firmware changes", imeis.len());
            return Ok(changes);
        }

        info!("🔎 Running firmware check for {} IMEI(s)... OK, {} firmware change(s)", imeis.len(), changes.len());
        for change in &changes {
            debug!(imei = %change.imei, "{} → {}", change.previous, change.current);
        }

        let Some(email) = email else {
            warn!("📧 No recipients configured, not sending the change report");
            return Ok(changes);
        };

        let sent = notify_all(self.notifier.as_ref(), &recipients, &email).await;
        info!("📧 Sent the change report to {}/{} recipient(s)", sent, recipients.len());
        Ok(changes)
    }

    fn change_report(&self, results: &[QueryResult], changes: &[VersionChange], now: DateTime<Utc>) -> Result<Email, ReportError> {
        let target = self.timezones.target();
        let reference = format!("{} ({})", now.with_timezone(&target).to_report_format(), offset_label(target));

        let mut body = format!(
            "A firmware change was detected on {} device(s). Reference time: {}\n\n",
            changes.len(),
            reference
        );
        for change in changes {
            body.push_str(&format!("{}: {} → {}\n", change.imei, change.previous, change.current));
        }

        Ok(Email::new("Firmware change detected", body).with_attachment(EmailAttachment {
            file_name: report_file_name(now, target),
            content_type: XLSX_CONTENT_TYPE.to_string(),
            content: self.exporter.export(results, now)?,
        }))
    }
}

#[derive(Default)]
struct MonitorState {
    active: bool,
    config: Option<Arc<RwLock<MonitorConfig>>>,
    job: Option<JoinHandle<()>>,
}

/// Owns the single monitoring job. Activating replaces whatever job was running.
pub struct Monitor {
    cycle: Arc<MonitorCycle>,
    state: Mutex<MonitorState>,
}

impl Monitor {
    pub fn new(cycle: MonitorCycle) -> Self {
        Monitor {
            cycle: Arc::new(cycle),
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub async fn activate(&self, request: MonitorRequest) -> Result<(), ValidationError> {
        let config = MonitorConfig::try_from(request)?;
        let schedule = config.schedule.clone();
        info!("🕗 Scheduling monitor for {} IMEI(s), {:?}...", config.imeis.len(), schedule);

        let mut state = self.state.lock().await;
        if let Some(job) = state.job.take() {
            job.abort();
            debug!("🕗 Stopped the previous monitor");
        }

        let config = Arc::new(RwLock::new(config));
        state.job = Some(tokio::spawn(run_schedule(self.cycle.clone(), schedule.clone(), config.clone())));
        state.config = Some(config);
        state.active = true;

        info!("🕗 Scheduling monitor, {:?}... OK", schedule);
        Ok(())
    }

    pub async fn deactivate(&self) {
        let mut state = self.state.lock().await;
        if let Some(job) = state.job.take() {
            job.abort();
        }
        state.active = false;
        info!("🕗 Stopped monitoring");
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.lock().await;
        let config = match &state.config {
            Some(config) => Some(config.read().await.clone()),
            None => None,
        };

        MonitorStatus {
            active: state.active,
            config,
        }
    }
}

async fn run_schedule(cycle: Arc<MonitorCycle>, schedule: MonitorSchedule, config: Arc<RwLock<MonitorConfig>>) {
    for next in schedule.after(Utc::now(), cycle.timezones.target()) {
        let Ok(duration) = next.signed_duration_since(Utc::now()).to_std() else {
            continue; // Already passed
        };

        sleep_until(Instant::now() + duration).await;

        debug!(scheduled_at = %next, "🕗 Running scheduled firmware check");
        if let Err(e) = cycle.run(&config).await {
            error!("🔎 Running firmware check... failed, {}", e);
        }
    }

    error!("🕗 Monitor schedule {:?} has no upcoming runs", schedule);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchPolicy;
    use crate::domain::{DeviceStatusRecord, TimeOfDay};
    use crate::fota::{AuthError, AuthToken, DeviceStatusFetcher, TokenProvider, UpstreamError};
    use crate::notify::NotifyError;
    use crate::report::XlsxExporter;
    use async_trait::async_trait;
    use chrono::{TimeDelta, Timelike};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use test_log::test;

    /// Reports whatever version is currently set for an IMEI.
    #[derive(Default)]
    struct FakeFleet {
        versions: StdMutex<HashMap<String, String>>,
        queries: StdMutex<usize>,
    }

    impl FakeFleet {
        fn set(&self, imei: &str, version: &str) {
            self.versions.lock().unwrap().insert(imei.to_string(), version.to_string());
        }

        fn queries(&self) -> usize {
            *self.queries.lock().unwrap()
        }
    }

    #[async_trait]
    impl TokenProvider for FakeFleet {
        async fn token(&self) -> Result<AuthToken, AuthError> {
            Ok(AuthToken::new("token", Utc::now() + TimeDelta::hours(1)))
        }
    }

    #[async_trait]
    impl DeviceStatusFetcher for FakeFleet {
        async fn query_device_status(&self, _token: &AuthToken, imeis: &[String]) -> Result<Vec<DeviceStatusRecord>, UpstreamError> {
            *self.queries.lock().unwrap() += 1;
            let versions = self.versions.lock().unwrap();
            Ok(imeis
                .iter()
                .filter_map(|imei| {
                    versions.get(imei).map(|version| DeviceStatusRecord {
                        imei: imei.clone(),
                        version: Some(version.clone()),
                        ..Default::default()
                    })
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<Email>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, email: &Email) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// Fails every export until told otherwise.
    struct FailingExporter {
        failing: AtomicBool,
    }

    impl ReportExporter for FailingExporter {
        fn export(&self, _results: &[QueryResult], _generated_at: DateTime<Utc>) -> Result<Vec<u8>, ReportError> {
            match self.failing.load(Ordering::SeqCst) {
                true => Err(rust_xlsxwriter::XlsxError::ParameterError("disk full".to_string()).into()),
                false => Ok(b"PK".to_vec()),
            }
        }
    }

    fn cycle(fleet: Arc<FakeFleet>, notifier: Arc<RecordingNotifier>) -> MonitorCycle {
        cycle_with_exporter(fleet, notifier, Arc::new(XlsxExporter::new(Timezones::default())))
    }

    fn cycle_with_exporter(fleet: Arc<FakeFleet>, notifier: Arc<RecordingNotifier>, exporter: Arc<dyn ReportExporter>) -> MonitorCycle {
        let policy = BatchPolicy {
            batch_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..BatchPolicy::default()
        };
        let controller = BatchController::new(fleet.clone(), fleet, policy, Timezones::default());
        MonitorCycle::new(Arc::new(controller), exporter, notifier, Timezones::default())
    }

    fn request(imeis: &[&str]) -> MonitorRequest {
        MonitorRequest {
            imeis: imeis.iter().map(|imei| imei.to_string()).collect(),
            expected_version: "1.1".to_string(),
            recipients: vec!["ops@example.com".to_string(), "fleet@example.com".to_string()],
            interval_minutes: 1,
            fixed_times: vec![],
        }
    }

    #[test]
    fn deserializes_a_request_with_delimited_lists() {
        let request: MonitorRequest = serde_json::from_value(json!({
            "imeis": ["111", "222"],
            "expectedVersion": "1.1",
            "recipients": "ops@example.com; fleet@example.com",
            "fixed_times": "08:00,18:00"
        }))
        .unwrap();

        assert_eq!(request.recipients, vec!["ops@example.com", "fleet@example.com"]);
        assert_eq!(request.fixed_times, vec!["08:00", "18:00"]);
        assert_eq!(request.interval_minutes, DEFAULT_INTERVAL_MINUTES);
    }

    #[test]
    fn deserializes_a_request_with_lists_and_snake_case_aliases() {
        let request: MonitorRequest = serde_json::from_value(json!({
            "imeis": ["111"],
            "expectedVersion": "1.1",
            "recipients": ["ops@example.com"],
            "interval_minutes": 15
        }))
        .unwrap();

        assert_eq!(request.recipients, vec!["ops@example.com"]);
        assert!(request.fixed_times.is_empty());
        assert_eq!(request.interval_minutes, 15);
    }

    #[test]
    fn validates_a_request() {
        let mut missing_version = request(&["111"]);
        missing_version.expected_version = " ".to_string();

        assert_eq!(
            MonitorConfig::try_from(request(&[" ", ""])).unwrap_err(),
            ValidationError::MissingIdentifiers
        );
        assert_eq!(MonitorConfig::try_from(missing_version).unwrap_err(), ValidationError::MissingExpectedVersion);
    }

    #[test(tokio::test)]
    async fn reports_only_when_a_version_changes() -> Result<(), MonitorError> {
        let fleet = Arc::new(FakeFleet::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let cycle = cycle(fleet.clone(), notifier.clone());
        let config = RwLock::new(MonitorConfig::try_from(request(&["111", "222"])).unwrap());
        fleet.set("111", "1.0");
        fleet.set("222", "1.0");

        let first = cycle.run(&config).await?;
        let second = cycle.run(&config).await?;
        fleet.set("222", "1.1");
        let third = cycle.run(&config).await?;

        assert!(first.is_empty());
        assert!(second.is_empty());
        assert_eq!(
            third,
            vec![VersionChange {
                imei: "222".to_string(),
                previous: "1.0".to_string(),
                current: "1.1".to_string(),
            }]
        );

        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.iter().map(|email| email.recipient.as_str()).collect::<Vec<_>>(), vec!["ops@example.com", "fleet@example.com"]);
        assert_eq!(sent[0].subject, "Firmware change detected");
        assert!(sent[0].body.contains("222: 1.0 → 1.1"));
        let attachment = sent[0].attachment.as_ref().unwrap();
        assert!(attachment.file_name.starts_with("report_"));
        assert!(!attachment.content.is_empty());

        let config = config.read().await;
        assert_eq!(config.snapshot.get("222").map(String::as_str), Some("1.1"));
        assert!(config.last_run_at.is_some());
        Ok(())
    }

    #[test(tokio::test)]
    async fn does_not_count_devices_that_disappear_as_changes() -> Result<(), MonitorError> {
        let fleet = Arc::new(FakeFleet::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let cycle = cycle(fleet.clone(), notifier.clone());
        let config = RwLock::new(MonitorConfig::try_from(request(&["111", "222"])).unwrap());
        fleet.set("111", "1.0");

        cycle.run(&config).await?;
        fleet.versions.lock().unwrap().clear();
        let changes = cycle.run(&config).await?;

        assert!(changes.is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
        Ok(())
    }

    #[test(tokio::test)]
    async fn reports_a_change_across_a_cycle_without_data() -> Result<(), MonitorError> {
        let fleet = Arc::new(FakeFleet::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let cycle = cycle(fleet.clone(), notifier.clone());
        let config = RwLock::new(MonitorConfig::try_from(request(&["111"])).unwrap());

        fleet.set("111", "1.0");
        cycle.run(&config).await?;
        fleet.versions.lock().unwrap().clear();
        let missing = cycle.run(&config).await?;
        fleet.set("111", "1.1");
        let changes = cycle.run(&config).await?;

        assert!(missing.is_empty());
        assert_eq!(
            changes,
            vec![VersionChange {
                imei: "111".to_string(),
                previous: "1.0".to_string(),
                current: "1.1".to_string(),
            }]
        );
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
        Ok(())
    }

    #[test(tokio::test)]
    async fn keeps_a_change_for_the_next_cycle_when_the_report_fails() -> Result<(), MonitorError> {
        let fleet = Arc::new(FakeFleet::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let exporter = Arc::new(FailingExporter {
            failing: AtomicBool::new(true),
        });
        let cycle = cycle_with_exporter(fleet.clone(), notifier.clone(), exporter.clone());
        let config = RwLock::new(MonitorConfig::try_from(request(&["111"])).unwrap());

        fleet.set("111", "1.0");
        cycle.run(&config).await?;
        fleet.set("111", "1.1");
        let failed = cycle.run(&config).await;

        assert!(matches!(failed, Err(MonitorError::Report(_))));
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert_eq!(config.read().await.snapshot.get("111").map(String::as_str), Some("1.0"));

        exporter.failing.store(false, Ordering::SeqCst);
        let changes = cycle.run(&config).await?;

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].current, "1.1");
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
        Ok(())
    }

    #[test(tokio::test(start_paused = true))]
    async fn activating_again_replaces_the_running_schedule() {
        let fleet = Arc::new(FakeFleet::default());
        let monitor = Monitor::new(cycle(fleet.clone(), Arc::new(RecordingNotifier::default())));
        let later = Utc::now().with_timezone(&Timezones::default().target()) + TimeDelta::hours(3);
        let fixed_time = TimeOfDay {
            hour: later.hour() as u8,
            minute: later.minute() as u8,
        }
        .to_string();

        monitor.activate(request(&["111"])).await.unwrap();
        let mut second = request(&["222"]);
        second.fixed_times = vec![fixed_time.clone()];
        monitor.activate(second).await.unwrap();

        tokio::time::sleep(Duration::from_secs(150)).await;

        assert_eq!(fleet.queries(), 0);
        let status = monitor.status().await;
        assert!(status.active);
        let config = status.config.unwrap();
        assert_eq!(config.imeis, vec!["222"]);
        assert_eq!(config.schedule, MonitorSchedule::FixedTimes(vec![fixed_time.parse().unwrap()]));
    }

    #[test(tokio::test(start_paused = true))]
    async fn runs_on_the_interval_until_deactivated() {
        let fleet = Arc::new(FakeFleet::default());
        let monitor = Monitor::new(cycle(fleet.clone(), Arc::new(RecordingNotifier::default())));
        fleet.set("111", "1.0");

        monitor.activate(request(&["111"])).await.unwrap();
        tokio::time::sleep(Duration::from_secs(90)).await;
        let queries = fleet.queries();
        monitor.deactivate().await;
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert!(queries >= 1);
        assert_eq!(fleet.queries(), queries);
        let status = monitor.status().await;
        assert!(!status.active);
        assert_eq!(status.config.map(|config| config.imeis), Some(vec!["111".to_string()]));
    }

    #[test(tokio::test)]
    async fn reports_an_inactive_monitor_without_config() {
        let monitor = Monitor::new(cycle(Arc::new(FakeFleet::default()), Arc::new(RecordingNotifier::default())));

        let status = serde_json::to_value(monitor.status().await).unwrap();

        assert_eq!(status, json!({ "active": false }));
    }

    #[test]
    fn serializes_the_config_for_status() {
        let config = MonitorConfig::try_from(request(&["111"])).unwrap();

        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "imeis": ["111"],
                "expectedVersion": "1.1",
                "recipients": ["ops@example.com", "fleet@example.com"],
                "intervalMinutes": 1
            })
        );
    }
}
