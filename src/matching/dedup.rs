use std::collections::{HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::model::Candidate;

use super::distance::distance_miles;

struct Component {
    representative: usize,
    size: usize,
    diversity: f64,
}

pub fn merge(candidates: Vec<Candidate>, radius_miles: f64) -> Vec<Candidate> {
    if !(radius_miles > 0.0) || candidates.is_empty() {
        return candidates;
    }

    let mut graph = UnGraph::<usize, f64>::with_capacity(candidates.len(), 0);
    let nodes = (0..candidates.len())
        .map(|index| graph.add_node(index))
        .collect::<Vec<NodeIndex>>();

    for (first, first_candidate) in candidates.iter().enumerate() {
        let Some(first_point) = first_candidate.point() else {
            continue;
        };

        for (second, second_candidate) in candidates.iter().enumerate().skip(first + 1) {
            let Some(second_point) = second_candidate.point() else {
                continue;
            };

            let miles = distance_miles(first_point, second_point);
            if miles <= radius_miles {
                graph.add_edge(nodes[first], nodes[second], miles);
            }
        }
    }

    let labels = component_labels(&graph);
    let all_sources = candidates
        .iter()
        .map(|candidate| candidate.source.as_str())
        .collect::<HashSet<&str>>()
        .len();

    let mut members = HashMap::<usize, Vec<usize>>::new();
    for (index, label) in labels.iter().enumerate() {
        members.entry(*label).or_default().push(index);
    }

    let components = members
        .values()
        .map(|indices| {
            let sources = indices
                .iter()
                .map(|index| candidates[*index].source.as_str())
                .collect::<HashSet<&str>>()
                .len();
            Component {
                representative: indices[0],
                size: indices.len(),
                diversity: sources as f64 / all_sources as f64,
            }
        })
        .map(|component| (component.representative, component))
        .collect::<HashMap<usize, Component>>();

    let before = candidates.len();
    let merged = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut candidate)| {
            let component = components.get(&index)?;
            if component.size > 1 {
                candidate.diversity_score = Some(component.diversity);
            } else {
                candidate.diversity_score.get_or_insert(0.0);
            }
            Some(candidate)
        })
        .collect::<Vec<Candidate>>();

    debug!(
        before,
        after = merged.len(),
        edges = graph.edge_count(),
        radius_miles,
        "merged nearby candidates"
    );

    merged
}

fn component_labels(graph: &UnGraph<usize, f64>) -> Vec<usize> {
    let mut components = UnionFind::<usize>::new(graph.node_count());
    for edge in graph.edge_references() {
        components.union(edge.source().index(), edge.target().index());
    }
    components.into_labeling()
}

pub fn merge_contained(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let index_by_id = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| candidate.id.as_deref().map(|id| (id, index)))
        .collect::<HashMap<&str, usize>>();

    if index_by_id.is_empty() {
        return candidates;
    }

    let mut families = UnionFind::<usize>::new(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.id.is_none() {
            continue;
        }
        let parent = candidate
            .contained_by
            .as_deref()
            .and_then(|parent| index_by_id.get(parent));
        if let Some(parent) = parent {
            families.union(index, *parent);
        }
    }

    let mut members = HashMap::<usize, Vec<usize>>::new();
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.id.is_some() {
            members.entry(families.find(index)).or_default().push(index);
        }
    }

    let mut renamed = HashMap::<usize, String>::new();
    for indices in members.values_mut() {
        indices.sort_by(|a, b| candidates[*a].id.cmp(&candidates[*b].id));
        let name = indices
            .iter()
            .map(|index| candidates[*index].name.as_str())
            .collect::<Vec<&str>>()
            .join(", ");
        renamed.insert(indices[0], name);
    }

    candidates
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut candidate)| {
            if candidate.id.is_none() {
                return Some(candidate);
            }
            let name = renamed.remove(&index)?;
            candidate.name = name;
            Some(candidate)
        })
        .collect()
}

pub fn assign_rank_scores(candidates: &mut [Candidate]) {
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank_score = Some(1.0 / (index as f64 + 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::{assign_rank_scores, merge, merge_contained};
    use crate::model::{Candidate, Coordinate};

    fn candidate(name: &str, latitude: f64, longitude: f64, source: &str) -> Candidate {
        Candidate::new(name, Coordinate::known(latitude, longitude), source)
    }

    fn family_member(id: &str, name: &str, contained_by: Option<&str>) -> Candidate {
        Candidate {
            id: Some(id.to_string()),
            contained_by: contained_by.map(ToOwned::to_owned),
            ..candidate(name, 36.0, -76.0, "edinburgh")
        }
    }

    fn sample() -> Vec<Candidate> {
        vec![
            candidate("Norfolk", 36.8508, -76.2859, "geonames"),
            candidate("Boston", 42.3601, -71.0589, "geonames"),
            // roughly two miles north of the first candidate
            candidate("Norfolk (city)", 36.8798, -76.2859, "wikipedia"),
            candidate("Unknown", 0.0, 0.0, "geonames"),
        ]
    }

    #[test]
    fn zero_radius_returns_input_unchanged() {
        let input = sample();
        assert_eq!(merge(input.clone(), 0.0), input);
        assert_eq!(merge(input.clone(), -3.0), input);
    }

    #[test]
    fn two_candidates_two_miles_apart_merge_into_one_representative() {
        let input = vec![
            candidate("Norfolk", 36.8508, -76.2859, "geonames"),
            candidate("Norfolk (city)", 36.8798, -76.2859, "wikipedia"),
        ];

        let merged = merge(input, 5.0);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Norfolk");
        assert_eq!(merged[0].diversity_score, Some(1.0));
    }

    #[test]
    fn merge_keeps_lowest_index_and_order() {
        let merged = merge(sample(), 5.0);

        let names = merged.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Norfolk", "Boston", "Unknown"]);
        // two sources overall, both contributed to the Norfolk component
        assert_eq!(merged[0].diversity_score, Some(1.0));
        assert_eq!(merged[1].diversity_score, Some(0.0));
        assert_eq!(merged[2].diversity_score, Some(0.0));
    }

    #[test]
    fn diversity_counts_distinct_sources_only() {
        let input = vec![
            candidate("A", 10.0, 10.0, "geonames"),
            candidate("A2", 10.001, 10.0, "geonames"),
            candidate("B", 50.0, 50.0, "osm"),
            candidate("C", -50.0, 50.0, "google"),
        ];

        let merged = merge(input, 1.0);
        assert_eq!(merged.len(), 3);
        let diversity = merged[0].diversity_score.expect("representative is scored");
        assert!((diversity - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn merge_is_idempotent() {
        let once = merge(sample(), 5.0);
        let twice = merge(once.clone(), 5.0);
        assert_eq!(once, twice);

        let chained = vec![
            candidate("a", 0.0, 0.0, "x"),
            candidate("b", 0.0, 0.04, "y"),
            candidate("c", 0.0, 0.08, "z"),
            candidate("d", 0.0, 3.0, "x"),
        ];
        let once = merge(chained, 3.0);
        assert_eq!(once.len(), 2);
        assert_eq!(merge(once.clone(), 3.0), once);
    }

    #[test]
    fn candidates_without_coordinates_stay_separate() {
        let mut missing = candidate("Nowhere", 0.0, 0.0, "llm");
        missing.latitude = None;
        let input = vec![missing.clone(), candidate("Origin", 0.0, 0.0, "geonames")];

        let merged = merge(input, 100.0);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "Nowhere");
    }

    #[test]
    fn contained_families_collapse_to_smallest_id() {
        let input = vec![
            family_member("rb3", "Virginia", None),
            family_member("rb1", "Norfolk", Some("rb3")),
            candidate("Unlinked", 1.0, 1.0, "edinburgh"),
            family_member("rb2", "Richmond", None),
        ];

        let merged = merge_contained(input);

        let names = merged.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Norfolk, Virginia", "Unlinked", "Richmond"]);
        assert_eq!(merged[0].id.as_deref(), Some("rb1"));
    }

    #[test]
    fn rank_scores_are_reciprocal_positions() {
        let mut input = sample();
        assign_rank_scores(&mut input);
        assert_eq!(input[0].rank_score, Some(1.0));
        assert_eq!(input[1].rank_score, Some(0.5));
        assert_eq!(input[3].rank_score, Some(0.25));
    }
}
