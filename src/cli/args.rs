use clap::{Parser, ValueEnum};
use crate::config::defs::{
    ALIGNED_PREFIX, ALIGNED_SUBDIR, COVERAGE_PREFIX, COVERAGE_SUBDIR, GENOME_MAP_SUBDIR, UNALIGNED_SUBDIR,
};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum Module {
    #[default]
    #[value(name = "unaligned_summary")]
    UnalignedSummary,
    #[value(name = "coverage_plot")]
    CoveragePlot,
    All,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "sampleqc-pipelines", version, about = "Pairs per-sample QC artifacts, runs per-sample transforms and merges the results")]
pub struct Arguments {

    #[arg(short, long, value_enum)]
    pub module: Module,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'b', long = "base-dir", default_value = ".", help = "Base directory that relative input sub-directories are resolved against")]
    pub base_dir: String,

    #[arg(long, default_value = UNALIGNED_SUBDIR)]
    pub unaligned_dir: String,

    #[arg(long, default_value = ALIGNED_SUBDIR)]
    pub aligned_dir: String,

    #[arg(long, default_value = GENOME_MAP_SUBDIR)]
    pub genome_map_dir: String,

    #[arg(long, default_value = COVERAGE_SUBDIR)]
    pub coverage_dir: String,

    #[arg(long, default_value = "")]
    pub unaligned_prefix: String,

    #[arg(long, help = "Literal suffix stripped from unaligned file base names (e.g. '.unaligned')")]
    pub unaligned_suffix: Option<String>,

    #[arg(long, default_value = ALIGNED_PREFIX)]
    pub aligned_prefix: String,

    #[arg(long)]
    pub aligned_suffix: Option<String>,

    #[arg(long, default_value = "")]
    pub genome_map_prefix: String,

    #[arg(long)]
    pub genome_map_suffix: Option<String>,

    #[arg(long, default_value = COVERAGE_PREFIX)]
    pub coverage_prefix: String,

    #[arg(long)]
    pub coverage_suffix: Option<String>,

    #[arg(short = 'o', long = "out", help = "Output directory for all generated files. If not specified, '<base-dir>/qc_results' is created.")]
    pub out_dir: Option<String>,

    #[arg(short = 't', long, help = "Maximum concurrent per-sample tasks; defaults to the physical core count")]
    pub threads: Option<usize>,

    #[arg(long, help = "External program run as '<prog> <sample_id> <unaligned> <alignments>' instead of the built-in statistics")]
    pub stats_cmd: Option<String>,

    #[arg(long, help = "External program run as '<prog> <sample_id> <genome_map> <coverage>' instead of the built-in plot")]
    pub plot_cmd: Option<String>,

    #[arg(long, default_value_t = false)]
    pub show_variants: bool,

    #[arg(long, default_value_t = false, help = "Take the first per-sample header without checking the others")]
    pub trust_headers: bool,

    #[arg(long, help = "SMOKE TESTS ONLY: keep at most N matched samples. Truncates real results if left on.")]
    pub debug_max_matches: Option<usize>,
}
