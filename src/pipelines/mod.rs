pub mod unaligned_summary;
pub mod coverage_plot;

use std::path::{Path, PathBuf};
use log::{info, warn};
use crate::config::defs::PipelineError;
use crate::utils::dispatch::{partition_outcomes, SampleOutcome};
use crate::utils::file::list_input_files;
use crate::utils::matcher::{inner_join, ArtifactSet, JoinOutcome, MatchCap};
use crate::utils::sample_key::{KeyRule, SampleId};

/// Outcome of one pipeline run, reported once all samples reached a terminal state.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub pipeline: String,
    pub matched: usize,
    pub succeeded: Vec<(SampleId, PathBuf)>,
    pub failed: Vec<(SampleId, String)>,
    pub only_left: Vec<SampleId>,
    pub only_right: Vec<SampleId>,
    pub truncated: usize,
    pub report: Option<PathBuf>,
}

impl RunSummary {
    pub fn new(pipeline: &str) -> Self {
        RunSummary { pipeline: pipeline.to_string(), ..Default::default() }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    fn record_join(&mut self, join: &JoinOutcome) {
        self.matched = join.pairs.len();
        self.only_left = join.only_left.clone();
        self.only_right = join.only_right.clone();
        self.truncated = join.truncated;
    }

    fn record_outcomes(&mut self, outcomes: Vec<SampleOutcome<PathBuf>>) {
        let (succeeded, failed) = partition_outcomes(outcomes);
        self.succeeded.extend(succeeded);
        self.failed.extend(failed.into_iter().map(|(id, e)| (id, e.to_string())));
        self.succeeded.sort_by(|a, b| a.0.cmp(&b.0));
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.succeeded.iter().map(|(_, path)| path.clone()).collect()
    }

    pub fn log(&self) {
        info!(
            "{}: {} matched, {} succeeded, {} failed, {} + {} unmatched",
            self.pipeline,
            self.matched,
            self.succeeded.len(),
            self.failed.len(),
            self.only_left.len(),
            self.only_right.len()
        );
        for (sample_id, reason) in &self.failed {
            warn!("{}: sample '{}' failed: {}", self.pipeline, sample_id, reason);
        }
        if !self.only_left.is_empty() || !self.only_right.is_empty() {
            warn!(
                "{}: excluded unmatched samples: {:?} / {:?}",
                self.pipeline,
                self.only_left.iter().map(SampleId::as_str).collect::<Vec<_>>(),
                self.only_right.iter().map(SampleId::as_str).collect::<Vec<_>>()
            );
        }
        if self.truncated > 0 {
            warn!("{}: {} matched samples dropped by --debug-max-matches", self.pipeline, self.truncated);
        }
        if let Some(report) = &self.report {
            info!("{}: report at {}", self.pipeline, report.display());
        }
    }
}

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FATAL: u8 = 1;
pub const EXIT_PARTIAL: u8 = 2;

/// Process exit status for a set of pipeline runs: any fatal error wins,
/// then any per-sample failure, otherwise success.
///
/// # Arguments
///
/// * `results` - One entry per pipeline that was run.
///
/// # Returns
/// `EXIT_FATAL`, `EXIT_PARTIAL` or `EXIT_SUCCESS`.
pub fn exit_status(results: &[Result<RunSummary, PipelineError>]) -> u8 {
    if results.iter().any(|r| r.is_err()) {
        EXIT_FATAL
    } else if results.iter().any(|r| r.as_ref().map(RunSummary::has_failures).unwrap_or(false)) {
        EXIT_PARTIAL
    } else {
        EXIT_SUCCESS
    }
}

/// DISCOVER and EXTRACT_KEYS for both collections, then JOIN.
///
/// # Arguments
///
/// * `left` / `right` - (collection name, directory, naming rule).
/// * `cap` - Debug cap on the number of matches.
///
/// # Returns
/// JoinOutcome, or a fatal error for missing directories and key collisions.
pub(crate) async fn discover_and_join(
    left: (&str, &Path, &KeyRule),
    right: (&str, &Path, &KeyRule),
    cap: MatchCap,
) -> Result<JoinOutcome, PipelineError> {
    let (left_files, right_files) = tokio::try_join!(list_input_files(left.1), list_input_files(right.1))
        .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
    info!(
        "Discovered {} {} files and {} {} files",
        left_files.len(),
        left.0,
        right_files.len(),
        right.0
    );

    let left_set = ArtifactSet::from_paths(left.0, &left_files, left.2)?;
    let right_set = ArtifactSet::from_paths(right.0, &right_files, right.2)?;

    let join = inner_join(&left_set, &right_set, cap);
    info!(
        "Matched {} samples ({} {}, {} {})",
        join.pairs.len(),
        left_set.len(),
        left.0,
        right_set.len(),
        right.0
    );
    Ok(join)
}
