use std::path::PathBuf;
use std::sync::Arc;
use log::info;
use crate::config::defs::{PipelineError, RunConfig, AGGREGATED_REPORT, UNALIGNED_SUMMARY_SUFFIX, UNALIGNED_SUMMARY_TAG};
use crate::pipelines::{discover_and_join, RunSummary};
use crate::utils::aggregate::{aggregate_reports, HeaderPolicy};
use crate::utils::command::ExternalTransform;
use crate::utils::dispatch::{dispatch, run_blocking};
use crate::utils::file::sample_output_path;
use crate::utils::matcher::{MatchCap, MatchedPair};
use crate::utils::sample_key::KeyRule;
use crate::utils::unaligned_stats::write_unaligned_summary;

/// Per-sample statistics for one matched pair (left = unaligned contigs,
/// right = alignment summary). A sample whose output file name equals the
/// aggregated report name fails instead of being overwritten by the report.
async fn sample_stats(
    pair: MatchedPair,
    out_dir: PathBuf,
    report: PathBuf,
    external: Option<ExternalTransform>,
) -> Result<PathBuf, PipelineError> {
    let sample_id = pair.sample_id.clone();
    let expected = sample_output_path(&out_dir, sample_id.as_str(), UNALIGNED_SUMMARY_SUFFIX);
    if expected == report {
        return Err(PipelineError::transform(
            sample_id.as_str(),
            format!("output {} collides with the aggregated report; rename the input files", expected.display()),
        ));
    }
    match external {
        Some(transform) => {
            transform
                .run(sample_id.as_str(), &pair.left.path, &pair.right.path, &out_dir, &expected)
                .await
                .map_err(|e| PipelineError::transform(sample_id.as_str(), format!("{:#}", e)))
        }
        None => {
            run_blocking(&sample_id, move || {
                write_unaligned_summary(pair.sample_id.as_str(), &pair.left.path, &pair.right.path, &out_dir)
            })
            .await
        }
    }
}

/// Run function for the unaligned-contig summary pipeline:
/// DISCOVER -> EXTRACT_KEYS -> JOIN -> DISPATCH -> BARRIER -> AGGREGATE.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// RunSummary on completion (possibly with per-sample failures);
/// PipelineError for key collisions, missing inputs or an empty aggregation.
pub async fn run(config: Arc<RunConfig>) -> Result<RunSummary, PipelineError> {
    let args = &config.args;
    let mut summary = RunSummary::new(UNALIGNED_SUMMARY_TAG);

    let unaligned_dir = config.input_dir(&args.unaligned_dir);
    let aligned_dir = config.input_dir(&args.aligned_dir);
    let unaligned_rule = KeyRule::new(&args.unaligned_prefix, args.unaligned_suffix.as_deref());
    let aligned_rule = KeyRule::new(&args.aligned_prefix, args.aligned_suffix.as_deref());

    let join = discover_and_join(
        ("unaligned", &unaligned_dir, &unaligned_rule),
        ("aligned", &aligned_dir, &aligned_rule),
        MatchCap::from(args.debug_max_matches),
    )
    .await?;
    summary.record_join(&join);

    let external = args.stats_cmd.as_deref().map(|p| ExternalTransform::resolved(p, &config.cwd));
    info!(
        "Dispatching {} samples with {} ({} workers)",
        join.pairs.len(),
        external.as_ref().map(|t| t.program.as_str()).unwrap_or("built-in statistics"),
        config.max_workers
    );
    let out_dir = config.out_dir.clone();
    let report_path = config.out_dir.join(AGGREGATED_REPORT);
    let sample_report = report_path.clone();
    let outcomes = dispatch(join.pairs, config.max_workers, move |pair| {
        sample_stats(pair, out_dir.clone(), sample_report.clone(), external.clone())
    })
    .await;
    summary.record_outcomes(outcomes);
    info!("All {} sample tasks finished", summary.matched);

    let policy = if args.trust_headers { HeaderPolicy::Trust } else { HeaderPolicy::Strict };
    let inputs = summary.outputs();
    let aggregated = tokio::task::spawn_blocking(move || aggregate_reports(&inputs, &report_path, policy))
        .await
        .map_err(|e| PipelineError::Other(e.into()))
        .and_then(|result| result);
    let aggregated = match aggregated {
        Ok(aggregated) => aggregated,
        Err(e) => {
            summary.log();
            return Err(e);
        }
    };

    for (path, reason) in &aggregated.skipped {
        if let Some(pos) = summary.succeeded.iter().position(|(_, p)| p == path) {
            let (sample_id, _) = summary.succeeded.remove(pos);
            summary.failed.push((sample_id, reason.clone()));
        }
    }
    summary.failed.sort_by(|a, b| a.0.cmp(&b.0));
    summary.report = Some(aggregated.report);

    Ok(summary)
}
