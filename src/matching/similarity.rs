use std::collections::HashSet;
use std::hash::Hash;

use crate::cli::SimilarityMode;
use crate::model::Candidate;

pub fn score(a: &str, b: &str) -> f64 {
    let first = a.chars().collect::<HashSet<char>>();
    let second = b.chars().collect::<HashSet<char>>();
    jaccard(&first, &second)
}

pub fn word_score(a: &str, b: &str) -> f64 {
    let first = a.split_whitespace().collect::<HashSet<&str>>();
    let second = b.split_whitespace().collect::<HashSet<&str>>();
    jaccard(&first, &second)
}

pub fn score_with(a: &str, b: &str, mode: SimilarityMode) -> f64 {
    match mode {
        SimilarityMode::Character => score(a, b),
        SimilarityMode::Word => word_score(a, b),
    }
}

fn jaccard<T: Eq + Hash>(first: &HashSet<T>, second: &HashSet<T>) -> f64 {
    let union = first.union(second).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = first.intersection(second).count();
    round4(intersection as f64 / union as f64)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn rank_by_similarity(entity: &str, candidates: &mut [Candidate], mode: SimilarityMode) {
    for candidate in candidates.iter_mut() {
        candidate.similarity = Some(score_with(entity, &candidate.name, mode));
    }

    candidates.sort_by(|a, b| {
        let left = a.similarity.unwrap_or(0.0);
        let right = b.similarity.unwrap_or(0.0);
        right.total_cmp(&left)
    });
}
