use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "toponym-eval",
    version,
    about = "Toponym disambiguation evaluation against gold coordinates and boundaries"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    Boundary(BoundaryArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SimilarityMode {
    Character,
    Word,
}

impl SimilarityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Word => "word",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MissingCoordinates {
    Indeterminate,
    Zero,
}

impl MissingCoordinates {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Indeterminate => "indeterminate",
            Self::Zero => "zero",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub resolutions_path: PathBuf,

    #[arg(long)]
    pub gold_path: Option<PathBuf>,

    #[arg(long, default_value_t = 25.0)]
    pub radius_miles: f64,

    #[arg(long)]
    pub merge_radius_miles: Option<f64>,

    #[arg(long, default_value = "rule-based/boundaries")]
    pub boundaries_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = SimilarityMode::Character)]
    pub similarity: SimilarityMode,

    #[arg(long, value_enum, default_value_t = MissingCoordinates::Indeterminate)]
    pub missing_coordinates: MissingCoordinates,

    #[arg(long, default_value = ".")]
    pub sentence_separator: String,

    #[arg(long, default_value = "replay")]
    pub tag: String,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BoundaryArgs {
    #[arg(long, default_value = "rule-based/boundaries")]
    pub boundaries_dir: PathBuf,

    #[arg(long)]
    pub region_key: String,

    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,
}
