use std::path::PathBuf;
use std::collections::HashMap;
use lazy_static::lazy_static;
use log::LevelFilter;
use plotters::style::RGBColor;
use thiserror::Error;
use crate::cli::Arguments;
use crate::utils::file::resolve_dir;
use crate::utils::system::detect_worker_count;

// Pipeline modules
pub const UNALIGNED_SUMMARY_TAG: &str = "unaligned_summary";
pub const COVERAGE_PLOT_TAG: &str = "coverage_plot";
pub const ALL_TAG: &str = "all";

// Default input naming rules
pub const ALIGNED_PREFIX: &str = "all_alignments_";
pub const COVERAGE_PREFIX: &str = "per_base_data_";
pub const UNALIGNED_SUBDIR: &str = "unaligned";
pub const ALIGNED_SUBDIR: &str = "alignments";
pub const GENOME_MAP_SUBDIR: &str = "genome_maps";
pub const COVERAGE_SUBDIR: &str = "coverage";
pub const OUT_SUBDIR: &str = "qc_results";

// Static Filenames
pub const UNALIGNED_SUMMARY_SUFFIX: &str = "_unaligned_summary.csv";
pub const COVERAGE_PLOT_SUFFIX: &str = "_circular_coverage_plot.png";
pub const AGGREGATED_REPORT: &str = "all_samples_unaligned_summary.csv";

pub const GZIP_EXT: &str = "gz";

// Static Parameters
pub const UNALIGNED_SUMMARY_HEADER: &str = "sample_id,total_bases,unaligned_bases,unaligned_pct";
pub const MISMATCH_RATE_THRESHOLD: f64 = 0.1;
pub const MIN_LABELLED_FEATURE_BP: usize = 50;
pub const MIN_LABELLED_MATCH_LENGTH: f64 = 20.0;
pub const MAX_LABEL_CHARS: usize = 30;

lazy_static! {
    pub static ref FEATURE_COLORS: HashMap<&'static str, RGBColor> = {
        let mut m = HashMap::new();
        m.insert("gene", RGBColor(0x44, 0x72, 0xC4));
        m.insert("CDS", RGBColor(0x70, 0xAD, 0x47));
        m.insert("promoter", RGBColor(0xFF, 0xC0, 0x00));
        m.insert("terminator", RGBColor(0xC5, 0x50, 0x4B));
        m.insert("origin", RGBColor(0x70, 0x30, 0xA0));
        m.insert("rep_origin", RGBColor(0x70, 0x30, 0xA0));
        m.insert("misc_feature", RGBColor(0x7F, 0x7F, 0x7F));
        m.insert("polyA_signal", RGBColor(0x8B, 0x45, 0x13));
        m.insert("protein_bind", RGBColor(0x00, 0xB0, 0xF0));
        m.insert("enhancer", RGBColor(0xFF, 0x69, 0xB4));
        m
    };
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sample identifier '{sample_id}' is produced by both {first} and {second} in the {collection} collection")]
    KeyCollision {
        collection: String,
        sample_id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Transform failed for sample '{sample_id}': {error}")]
    SampleTransform {
        sample_id: String,
        error: String,
    },

    #[error("No successful per-sample results to aggregate into {0}")]
    EmptyAggregation(PathBuf),

    #[error("Header of {path} ('{found}') does not match '{expected}'")]
    HeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("IO error: {0}")]
    IOError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn transform(sample_id: &str, error: impl ToString) -> Self {
        PipelineError::SampleTransform {
            sample_id: sample_id.to_string(),
            error: error.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::IOError(e.to_string())
    }
}


pub struct RunConfig {
    pub cwd: PathBuf,
    pub base_dir: PathBuf,
    pub out_dir: PathBuf,
    pub args: Arguments,
    pub max_workers: usize,
    pub log_level: LevelFilter,
}

impl RunConfig {
    /// Builds the run configuration and creates the output directory.
    /// If `--out` is not given, `<base_dir>/qc_results` is used.
    ///
    /// # Arguments
    /// * `args` - The parsed command-line arguments.
    /// * `cwd` - The current working directory.
    /// # Returns
    /// RunConfig with absolute base and output directories.
    pub fn new(args: Arguments, cwd: PathBuf) -> Result<Self, PipelineError> {
        let base_dir = resolve_dir(&args.base_dir, &cwd);
        if !base_dir.is_dir() {
            return Err(PipelineError::InvalidConfig(format!(
                "Base directory {} does not exist",
                base_dir.display()
            )));
        }
        let out_dir = match &args.out_dir {
            Some(out) => resolve_dir(out, &cwd),
            None => base_dir.join(OUT_SUBDIR),
        };
        std::fs::create_dir_all(&out_dir).map_err(|e| {
            PipelineError::InvalidConfig(format!("Cannot create output directory {}: {}", out_dir.display(), e))
        })?;

        let log_level = Self::log_filter(args.verbose);
        let max_workers = detect_worker_count(args.threads);
        Ok(RunConfig { cwd, base_dir, out_dir, args, max_workers, log_level })
    }

    /// Log level for the run: debug with `-v`, info otherwise.
    pub fn log_filter(verbose: bool) -> LevelFilter {
        if verbose { LevelFilter::Debug } else { LevelFilter::Info }
    }

    /// Resolves an input sub-directory against the base directory.
    pub fn input_dir(&self, dir: &str) -> PathBuf {
        resolve_dir(dir, &self.base_dir)
    }
}
