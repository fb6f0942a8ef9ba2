use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "defect-match",
    version,
    about = "Wafer defect correspondence and rule-based classification"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Classify(ClassifyArgs),
    Match(MatchArgs),
    RulesCheck(RulesCheckArgs),
    Threshold(ThresholdArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(long)]
    pub rules: PathBuf,

    #[arg(long)]
    pub observations: PathBuf,

    #[arg(long, default_value = "reports")]
    pub report_dir: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    #[arg(long)]
    pub candidates: PathBuf,

    #[arg(long)]
    pub references: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub radius: Option<f64>,

    #[arg(long)]
    pub edge_radius: Option<f64>,

    #[arg(long = "special-type-code")]
    pub special_type_codes: Vec<i64>,

    #[arg(long)]
    pub rules: Option<PathBuf>,

    #[arg(long, default_value = "reports")]
    pub report_dir: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RulesCheckArgs {
    #[arg(long)]
    pub rules: PathBuf,

    /// Sample table to report per-condition hit counts against.
    #[arg(long)]
    pub observations: Option<PathBuf>,

    #[arg(long)]
    pub normalized_output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub allow_issues: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ThresholdArgs {
    #[arg(long)]
    pub radius: f64,
}
