use crate::batch::policy::{BatchPolicy, Chunk, Granularity, Outcome, partition, resolve};
use crate::domain::{DeviceStatusRecord, ERROR_MARKER, NOT_FOUND_MARKER, QueryOutcome, QueryResult, Timezones, ValidationError};
use crate::fota::{AuthError, DeviceStatusFetcher, TokenProvider};
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("authentication with the FOTA API failed: {0}")]
    Auth(#[from] AuthError),
}

/// Queries the status of an arbitrary number of devices, one chunk at a time.
///
/// Failed chunks are retried at a smaller granularity instead of aborting the job, see [`resolve`]. Only an empty
/// identifier list or a failing token exchange fail the whole call. Runs never overlap: a second caller waits until
/// the current job has finished.
pub struct BatchController {
    tokens: Arc<dyn TokenProvider>,
    fetcher: Arc<dyn DeviceStatusFetcher>,
    policy: BatchPolicy,
    timezones: Timezones,
    running: Mutex<()>,
}

impl BatchController {
    pub fn new(tokens: Arc<dyn TokenProvider>, fetcher: Arc<dyn DeviceStatusFetcher>, policy: BatchPolicy, timezones: Timezones) -> Self {
        BatchController {
            tokens,
            fetcher,
            policy,
            timezones,
            running: Mutex::new(()),
        }
    }

    #[instrument(skip_all, fields(imeis = imeis.len()))]
    pub async fn run(&self, imeis: &[String], expected_version: &str) -> Result<QueryOutcome, BatchError> {
        if imeis.is_empty() {
            return Err(ValidationError::MissingIdentifiers.into());
        }

        let _running = self.running.lock().await;

        let batches = partition(imeis, &self.policy);
        let total = batches.len();
        info!("📦 Querying {} IMEI(s) in {} batch(es)...", imeis.len(), total);
        let start = Instant::now();

        let mut job = BatchJob::new(expected_version, self.timezones);
        for (index, batch) in batches.into_iter().enumerate() {
            if index > 0 {
                sleep(self.policy.batch_delay).await;
            }

            debug!("📦 Querying batch {}/{} ({} IMEIs)...", index + 1, total, batch.imeis.len());
            self.run_batch(batch, &mut job).await?;
        }

        let outcome = job.finish();
        info!(
            duration = ?start.elapsed(),
            "📦 Querying {} IMEI(s) in {} batch(es)... OK, {} result(s), {} unresolved",
            imeis.len(),
            total,
            outcome.results.len(),
            outcome.failed_identifiers.len()
        );
        Ok(outcome)
    }

    async fn run_batch(&self, batch: Chunk, job: &mut BatchJob) -> Result<(), AuthError> {
        let mut pending = VecDeque::from([batch]);

        while let Some(chunk) = pending.pop_front() {
            if chunk.granularity != Granularity::Batch {
                sleep(self.policy.retry_delay).await;
            }

            let token = self.tokens.token().await?;
            let result = self.fetcher.query_device_status(&token, &chunk.imeis).await;

            match resolve(&self.policy, &chunk, result) {
                Outcome::Success(records) => job.record_success(&chunk.imeis, records),
                Outcome::Degrade(chunks) => {
                    for chunk in chunks.into_iter().rev() {
                        pending.push_front(chunk);
                    }
                }
                Outcome::Unresolved(imeis) => {
                    warn!("⚠️ Giving up on IMEI {}", imeis.join(", "));
                    job.failed_identifiers.extend(imeis);
                }
                Outcome::Errored(imeis) => {
                    warn!("⚠️ Marking {} IMEI(s) as {}", imeis.len(), ERROR_MARKER);
                    job.record_markers(imeis, ERROR_MARKER);
                }
            }
        }

        Ok(())
    }
}

struct BatchJob {
    expected_version: String,
    timezones: Timezones,
    results: Vec<QueryResult>,
    failed_identifiers: Vec<String>,
}

impl BatchJob {
    fn new(expected_version: &str, timezones: Timezones) -> Self {
        BatchJob {
            expected_version: expected_version.to_string(),
            timezones,
            results: Vec::new(),
            failed_identifiers: Vec::new(),
        }
    }

    fn record_success(&mut self, requested: &[String], records: Vec<DeviceStatusRecord>) {
        let now = Utc::now();
        let returned = records.iter().map(|record| record.imei.clone()).collect::<HashSet<_>>();

        self.results.extend(
            records
                .into_iter()
                .map(|record| QueryResult::from_record(record, &self.expected_version, now, &self.timezones)),
        );

        let missing = requested.iter().filter(|imei| !returned.contains(*imei)).cloned().collect::<Vec<_>>();
        if !missing.is_empty() {
            debug!("{} IMEI(s) missing from the response", missing.len());
            self.record_markers(missing, NOT_FOUND_MARKER);
        }
    }

    fn record_markers(&mut self, imeis: Vec<String>, marker: &str) {
        let expected_version = &self.expected_version;
        self.results
            .extend(imeis.into_iter().map(|imei| QueryResult::marker(imei, marker, expected_version)));
    }

    fn finish(self) -> QueryOutcome {
        QueryOutcome {
            results: self.results,
            failed_identifiers: self.failed_identifiers,
        }
    }
}
