use std::path::PathBuf;
use std::sync::Arc;
use log::{info, warn};
use crate::config::defs::{PipelineError, RunConfig, COVERAGE_PLOT_SUFFIX, COVERAGE_PLOT_TAG};
use crate::pipelines::{discover_and_join, RunSummary};
use crate::utils::command::ExternalTransform;
use crate::utils::dispatch::{dispatch, run_blocking};
use crate::utils::file::sample_output_path;
use crate::utils::matcher::{MatchCap, MatchedPair};
use crate::utils::plotting::write_coverage_plot;
use crate::utils::sample_key::KeyRule;

async fn sample_plot(
    pair: MatchedPair,
    out_dir: PathBuf,
    external: Option<ExternalTransform>,
    show_variants: bool,
) -> Result<PathBuf, PipelineError> {
    let sample_id = pair.sample_id.clone();
    match external {
        Some(transform) => {
            let expected = sample_output_path(&out_dir, sample_id.as_str(), COVERAGE_PLOT_SUFFIX);
            transform
                .run(sample_id.as_str(), &pair.left.path, &pair.right.path, &out_dir, &expected)
                .await
                .map_err(|e| PipelineError::transform(sample_id.as_str(), format!("{:#}", e)))
        }
        None => {
            run_blocking(&sample_id, move || {
                write_coverage_plot(pair.sample_id.as_str(), &pair.left.path, &pair.right.path, &out_dir, show_variants)
            })
            .await
        }
    }
}

/// Run function for the circular coverage plot pipeline:
/// DISCOVER -> EXTRACT_KEYS -> JOIN -> DISPATCH -> BARRIER.
/// Pairs each genome map with its per-base coverage table and writes one image per sample.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
///
/// # Returns
/// RunSummary listing the images written and any per-sample failures.
pub async fn run(config: Arc<RunConfig>) -> Result<RunSummary, PipelineError> {
    let args = &config.args;
    let mut summary = RunSummary::new(COVERAGE_PLOT_TAG);

    let map_dir = config.input_dir(&args.genome_map_dir);
    let coverage_dir = config.input_dir(&args.coverage_dir);
    let map_rule = KeyRule::new(&args.genome_map_prefix, args.genome_map_suffix.as_deref());
    let coverage_rule = KeyRule::new(&args.coverage_prefix, args.coverage_suffix.as_deref());

    let join = discover_and_join(
        ("genome map", &map_dir, &map_rule),
        ("coverage", &coverage_dir, &coverage_rule),
        MatchCap::from(args.debug_max_matches),
    )
    .await?;
    summary.record_join(&join);
    if join.pairs.is_empty() {
        warn!("No genome map matched a coverage table; nothing to plot");
        return Ok(summary);
    }

    let external = args.plot_cmd.as_deref().map(|p| ExternalTransform::resolved(p, &config.cwd));
    let out_dir = config.out_dir.clone();
    let show_variants = args.show_variants;
    let outcomes = dispatch(join.pairs, config.max_workers, move |pair| {
        sample_plot(pair, out_dir.clone(), external.clone(), show_variants)
    })
    .await;
    summary.record_outcomes(outcomes);
    info!("All {} plot tasks finished", summary.matched);

    Ok(summary)
}
