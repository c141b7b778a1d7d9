use crate::fota::UpstreamError;
use std::time::Duration;
use tracing::debug;

/// Chunk sizes and pacing for a batch query.
///
/// The upstream enforces an undocumented request size limit, so none of these values are protocol constants.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub sub_batch_size: usize,
    pub batch_delay: Duration,
    pub retry_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy {
            batch_size: 50,
            sub_batch_size: 10,
            batch_delay: Duration::from_secs(10),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// The rung of the retry ladder a chunk is attempted at.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Granularity {
    Batch,
    SubBatch,
    Single,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Chunk {
    pub imeis: Vec<String>,
    pub granularity: Granularity,
}

impl Chunk {
    fn split(imeis: &[String], size: usize, granularity: Granularity) -> Vec<Chunk> {
        imeis
            .chunks(size.max(1))
            .map(|imeis| Chunk {
                imeis: imeis.to_vec(),
                granularity,
            })
            .collect()
    }
}

#[derive(Debug, PartialEq)]
pub enum Outcome<T> {
    /// The fetch succeeded.
    Success(T),
    /// Retry the identifiers as these smaller chunks, in order.
    Degrade(Vec<Chunk>),
    /// Every granularity has been tried, the identifiers stay unresolved.
    Unresolved(Vec<String>),
    /// The failure is not worth degrading, the identifiers are reported as errors.
    Errored(Vec<String>),
}

/// Splits the identifiers into top-level chunks of `batch_size`, preserving order.
pub fn partition(imeis: &[String], policy: &BatchPolicy) -> Vec<Chunk> {
    Chunk::split(imeis, policy.batch_size, Granularity::Batch)
}

/// Decides what happens to a chunk after one fetch attempt.
///
/// Batches larger than a sub-batch only degrade into sub-batches when the upstream looks overloaded, any other failure
/// marks them as errors. Small batches and failed sub-batches go straight to single identifiers, and a failed chunk of
/// one identifier is final whatever its granularity.
pub fn resolve<T>(policy: &BatchPolicy, chunk: &Chunk, result: Result<T, UpstreamError>) -> Outcome<T> {
    let error = match result {
        Ok(value) => return Outcome::Success(value),
        Err(error) => error,
    };

    let outcome = match chunk.granularity {
        _ if chunk.imeis.len() <= 1 => Outcome::Unresolved(chunk.imeis.clone()),
        Granularity::Batch if chunk.imeis.len() > policy.sub_batch_size => {
            if error.is_overload() {
                Outcome::Degrade(Chunk::split(&chunk.imeis, policy.sub_batch_size, Granularity::SubBatch))
            } else {
                Outcome::Errored(chunk.imeis.clone())
            }
        }
        Granularity::Batch | Granularity::SubBatch => Outcome::Degrade(Chunk::split(&chunk.imeis, 1, Granularity::Single)),
        Granularity::Single => Outcome::Unresolved(chunk.imeis.clone()),
    };

    debug!(granularity = ?chunk.granularity, imeis = chunk.imeis.len(), "{} → {}", error, outcome.describe());
    outcome
}

impl<T> Outcome<T> {
    fn describe(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Degrade(chunks) if chunks.first().is_some_and(|chunk| chunk.granularity == Granularity::Single) => "degrading to single IMEIs",
            Outcome::Degrade(_) => "degrading to sub-batches",
            Outcome::Unresolved(_) => "unresolved",
            Outcome::Errored(_) => "marked as error",
        }
    }
}
