/// Fan-out of independent per-sample transforms with a single collection barrier.
use std::future::Future;
use std::sync::Arc;
use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::Semaphore;
use crate::config::defs::PipelineError;
use crate::utils::matcher::MatchedPair;
use crate::utils::sample_key::SampleId;

/// Terminal state of one dispatched transform.
#[derive(Debug)]
pub struct SampleOutcome<T> {
    pub sample_id: SampleId,
    pub result: Result<T, PipelineError>,
}

/// Runs `transform` once per matched pair, at most `max_workers` at a time.
/// A failing or panicking transform is recorded for its sample and does not
/// cancel the others. Returns only after every transform has finished.
///
/// # Arguments
///
/// * `pairs` - Matched samples to process.
/// * `max_workers` - Concurrency limit (0 is treated as 1).
/// * `transform` - Per-sample unit of work.
///
/// # Returns
/// One SampleOutcome per pair, in no particular order relative to completion.
pub async fn dispatch<T, F, Fut>(pairs: Vec<MatchedPair>, max_workers: usize, transform: F) -> Vec<SampleOutcome<T>>
where
    T: Send + 'static,
    F: Fn(MatchedPair) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, PipelineError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let transform = Arc::new(transform);

    let mut sample_ids = Vec::with_capacity(pairs.len());
    let mut handles = Vec::with_capacity(pairs.len());
    for pair in pairs {
        sample_ids.push(pair.sample_id.clone());
        let semaphore = Arc::clone(&semaphore);
        let transform = Arc::clone(&transform);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Other(e.into()))?;
            debug!("Starting sample '{}'", pair.sample_id);
            transform(pair).await
        }));
    }

    let joined = join_all(handles).await;

    sample_ids
        .into_iter()
        .zip(joined)
        .map(|(sample_id, joined)| {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(PipelineError::transform(sample_id.as_str(), format!("task aborted: {}", e))),
            };
            if let Err(e) = &result {
                warn!("Sample '{}' failed: {}", sample_id, e);
            }
            SampleOutcome { sample_id, result }
        })
        .collect()
}

/// Runs CPU-bound per-sample work on the blocking pool, mapping any error or
/// panic into a per-sample transform error.
pub async fn run_blocking<T, F>(sample_id: &SampleId, work: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::transform(sample_id.as_str(), format!("{:#}", e))),
        Err(e) => Err(PipelineError::transform(sample_id.as_str(), format!("task aborted: {}", e))),
    }
}

/// Splits outcomes into successes and failures.
pub fn partition_outcomes<T>(outcomes: Vec<SampleOutcome<T>>) -> (Vec<(SampleId, T)>, Vec<(SampleId, PipelineError)>) {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => succeeded.push((outcome.sample_id, value)),
            Err(e) => failed.push((outcome.sample_id, e)),
        }
    }
    (succeeded, failed)
}
