use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cli::{EvaluateArgs, MissingCoordinates, SimilarityMode};
use crate::matching::{
    assign_rank_scores, distance_miles, load_boundary, matches, merge, merge_contained,
    rank_by_similarity, within,
};
use crate::model::{
    ConfusionTally, EvaluationMetrics, EvaluationReport, Experiment, MatchOutcome, ResolvedPlaces,
    RunCounts, RunParams,
};
use crate::resolver::{PlaceResolver, ResolveQuery};
use crate::util::now_utc_string;

use super::gold::{GoldEntry, GoldInput};

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    pub radius_miles: f64,
    pub merge_radius_miles: Option<f64>,
    pub boundaries_dir: PathBuf,
    pub similarity: SimilarityMode,
    pub missing_coordinates: MissingCoordinates,
    pub sentence_separator: String,
}

impl From<&EvaluateArgs> for EvaluationConfig {
    fn from(args: &EvaluateArgs) -> Self {
        Self {
            radius_miles: args.radius_miles,
            merge_radius_miles: args.merge_radius_miles,
            boundaries_dir: args.boundaries_dir.clone(),
            similarity: args.similarity,
            missing_coordinates: args.missing_coordinates,
            sentence_separator: args.sentence_separator.clone(),
        }
    }
}

impl EvaluationConfig {
    fn params(&self, resolver: &str) -> RunParams {
        RunParams {
            resolver: resolver.to_string(),
            radius_miles: self.radius_miles,
            merge_radius_miles: self.merge_radius_miles,
            boundaries_dir: self.boundaries_dir.display().to_string(),
            similarity: self.similarity.as_str().to_string(),
            missing_coordinates: self.missing_coordinates.as_str().to_string(),
            sentence_separator: self.sentence_separator.clone(),
        }
    }
}

pub fn evaluate(
    gold: &GoldInput,
    resolver: &dyn PlaceResolver,
    config: &EvaluationConfig,
) -> EvaluationReport {
    let started = Instant::now();
    let mut tally = ConfusionTally::default();
    let mut counts = RunCounts {
        malformed_lines: gold.malformed_lines,
        ..RunCounts::default()
    };
    let mut experiments = Vec::with_capacity(gold.entries.len());

    info!(
        resolver = resolver.name(),
        records = gold.entries.len(),
        radius_miles = config.radius_miles,
        "evaluation started"
    );

    for entry in &gold.entries {
        let resolved = evaluate_record(entry, resolver, config, &mut counts);
        tally.record(resolved.outcome);
        counts.records_evaluated += 1;

        experiments.push(Experiment {
            reference_place: entry.raw.clone(),
            resolved_places: resolved,
        });
    }

    let runtime_seconds = started.elapsed().as_secs_f64();
    info!(
        true_positive = tally.true_positive,
        false_positive = tally.false_positive,
        indeterminate = tally.false_negative,
        resolver_errors = counts.resolver_errors,
        runtime_seconds,
        "evaluation finished"
    );

    EvaluationReport {
        generated_at: now_utc_string(),
        gold_sha256: None,
        params: config.params(resolver.name()),
        conf_mat: tally,
        metrics: metrics_from_tally(&tally),
        counts,
        runtime_seconds,
        experiments,
    }
}

fn evaluate_record(
    entry: &GoldEntry,
    resolver: &dyn PlaceResolver,
    config: &EvaluationConfig,
    counts: &mut RunCounts,
) -> ResolvedPlaces {
    let record = &entry.record;
    let sentences = record.sentences();
    let document = record.document(&config.sentence_separator);
    let location_hint = record.location_hint();
    let query = ResolveQuery {
        entity: &record.entity,
        document: &document,
        sentences: &sentences,
        location_hint: location_hint.as_deref(),
        record: &entry.raw,
    };

    let mut candidates = match resolver.resolve(&query) {
        Ok(candidates) => candidates,
        Err(err) => {
            counts.resolver_errors += 1;
            let message = format!("{err:#}");
            warn!(entity = %record.entity, resolver = resolver.name(), error = %message, "resolver failed");
            return ResolvedPlaces::failed(message);
        }
    };

    if candidates.is_empty() {
        counts.empty_resolutions += 1;
        debug!(entity = %record.entity, "resolver returned no candidates");
        return ResolvedPlaces::indeterminate(Vec::new(), 0);
    }

    assign_rank_scores(&mut candidates);
    candidates = merge_contained(candidates);
    if let Some(radius) = config.merge_radius_miles {
        candidates = merge(candidates, radius);
    }
    rank_by_similarity(&record.entity, &mut candidates, config.similarity);

    let candidate_count = candidates.len();
    let Some(top) = candidates.into_iter().next() else {
        return ResolvedPlaces::indeterminate(Vec::new(), 0);
    };

    let Some(point) = top.coordinate().resolve(config.missing_coordinates) else {
        debug!(entity = %record.entity, candidate = %top.name, "top candidate has no usable coordinate");
        return ResolvedPlaces::indeterminate(vec![top], candidate_count);
    };

    let reference = record.lat_long.resolve(config.missing_coordinates);
    let distance = reference.map(|reference| distance_miles(reference, point));

    let outcome = match record.region_key.as_deref() {
        Some(region_key) => {
            counts.boundary_checks += 1;
            let boundary = load_boundary(&config.boundaries_dir, region_key);
            if boundary.is_none() {
                counts.missing_boundaries += 1;
            }
            MatchOutcome::from(within(point, boundary.as_ref()))
        }
        None => match reference {
            Some(reference) => MatchOutcome::from(matches(reference, point, config.radius_miles)),
            None => MatchOutcome::Indeterminate,
        },
    };

    debug!(
        entity = %record.entity,
        candidate = %top.name,
        distance_miles = distance,
        outcome = outcome.as_str(),
        "scored toponym"
    );

    ResolvedPlaces {
        toponym: vec![top],
        candidate_count,
        matched_ref: outcome.matched_ref(),
        outcome,
        distance_miles: distance,
        error: None,
    }
}

pub fn metrics_from_tally(tally: &ConfusionTally) -> EvaluationMetrics {
    let precision = ratio(
        tally.true_positive,
        tally.true_positive + tally.false_positive,
    );
    let recall = ratio(
        tally.true_positive,
        tally.true_positive + tally.false_negative,
    );
    let f1 = match (precision, recall) {
        (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
        (Some(_), Some(_)) => Some(0.0),
        _ => None,
    };

    EvaluationMetrics {
        precision,
        recall,
        f1,
        accuracy: ratio(tally.true_positive, tally.total()),
    }
}

pub fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}
