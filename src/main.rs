use std::env;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{error, info};

use sampleqc_pipelines::cli::{parse, Module};
use sampleqc_pipelines::config::defs::{PipelineError, RunConfig};
use sampleqc_pipelines::pipelines::{coverage_plot, exit_status, unaligned_summary, RunSummary, EXIT_FATAL};


#[tokio::main]
async fn main() -> Result<ExitCode> {
    let run_start = Instant::now();

    let args = parse();

    // Logger starts before RunConfig so that config errors are logged
    Builder::new()
        .filter_level(RunConfig::log_filter(args.verbose))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n SampleQC\n-------------\n");

    let dir = env::current_dir()?;
    info!("The current directory is {:?}", dir);

    let module = args.module;
    let run_config = match RunConfig::new(args, dir) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Ok(ExitCode::from(EXIT_FATAL));
        }
    };
    log::set_max_level(run_config.log_level);
    info!("Input base {:?}; output {:?}; {} workers", run_config.base_dir, run_config.out_dir, run_config.max_workers);
    if let Some(n) = run_config.args.debug_max_matches {
        info!("--debug-max-matches {} is set: results are truncated, smoke-test only", n);
    }

    let results: Vec<Result<RunSummary, PipelineError>> = match module {
        Module::UnalignedSummary => vec![unaligned_summary::run(run_config.clone()).await],
        Module::CoveragePlot => vec![coverage_plot::run(run_config.clone()).await],
        Module::All => {
            let (stats, plots) = tokio::join!(
                unaligned_summary::run(run_config.clone()),
                coverage_plot::run(run_config.clone())
            );
            vec![stats, plots]
        }
    };

    for result in &results {
        match result {
            Ok(summary) => summary.log(),
            Err(e) => error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis()),
        }
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(ExitCode::from(exit_status(&results)))
}
