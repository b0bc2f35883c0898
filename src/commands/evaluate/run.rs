use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::EvaluateArgs;
use crate::resolver::ReplayResolver;
use crate::util::{sha256_file, write_json_pretty};

use super::driver::{EvaluationConfig, evaluate};
use super::gold::{gold_from_values, read_gold_records};

pub fn run(args: EvaluateArgs) -> Result<()> {
    if !(args.radius_miles >= 0.0) {
        bail!("--radius-miles must be a non-negative number, got {}", args.radius_miles);
    }
    if args.tag.trim().is_empty() {
        bail!("--tag must not be empty");
    }

    let resolver = ReplayResolver::load(&args.resolutions_path, &args.tag)?;
    if resolver.malformed_entries() > 0 {
        warn!(
            malformed = resolver.malformed_entries(),
            "some captured resolutions were skipped"
        );
    }

    let (gold, gold_path) = match &args.gold_path {
        Some(path) => (read_gold_records(path)?, path.clone()),
        None => {
            info!("no gold file given; scoring the source records of the resolutions file");
            (
                gold_from_values(resolver.gold_records()),
                args.resolutions_path.clone(),
            )
        }
    };

    if gold.entries.is_empty() {
        warn!(path = %gold_path.display(), "no gold records to evaluate");
    }

    let config = EvaluationConfig::from(&args);
    let mut report = evaluate(&gold, &resolver, &config);
    report.gold_sha256 = Some(sha256_file(&gold_path)?);

    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| default_report_path(&gold_path, &args.tag));

    write_json_pretty(&report_path, &report)?;
    info!(
        path = %report_path.display(),
        true_positive = report.conf_mat.true_positive,
        false_positive = report.conf_mat.false_positive,
        indeterminate = report.conf_mat.false_negative,
        "wrote evaluation report"
    );

    Ok(())
}

pub fn default_report_path(gold_path: &Path, tag: &str) -> PathBuf {
    let raw = gold_path.to_string_lossy();
    let stem = raw
        .strip_suffix(".jsonl")
        .or_else(|| raw.strip_suffix(".json"))
        .unwrap_or(&raw);

    let report = format!("{stem}.eval.{tag}.json");
    PathBuf::from(report.replace("/disambiguated/", "/disambiguated/eval-results/"))
}
