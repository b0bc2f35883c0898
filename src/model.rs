use geo::Point;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::cli::MissingCoordinates;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    // Geometry uses (x = longitude, y = latitude).
    pub fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(Option<f64>, Option<f64>)", into = "(Option<f64>, Option<f64>)")]
pub struct Coordinate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Coordinate {
    pub fn known(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    pub fn point(self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn resolve(self, policy: MissingCoordinates) -> Option<GeoPoint> {
        if let Some(point) = self.point() {
            return Some(point);
        }

        match policy {
            MissingCoordinates::Indeterminate => None,
            MissingCoordinates::Zero => Some(GeoPoint::new(
                self.latitude.unwrap_or(0.0),
                self.longitude.unwrap_or(0.0),
            )),
        }
    }
}

impl From<(Option<f64>, Option<f64>)> for Coordinate {
    fn from((latitude, longitude): (Option<f64>, Option<f64>)) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<Coordinate> for (Option<f64>, Option<f64>) {
    fn from(value: Coordinate) -> Self {
        (value.latitude, value.longitude)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoldContext {
    #[serde(default)]
    pub sents: Vec<GoldSentence>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoldSentence {
    pub sent: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaDetails {
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoldRecord {
    pub entity: String,
    #[serde(default)]
    pub lat_long: Coordinate,
    #[serde(default, rename = "is_state", deserialize_with = "deserialize_region_key")]
    pub region_key: Option<String>,
    #[serde(default)]
    pub context: GoldContext,
    #[serde(default)]
    pub media_dets: Option<MediaDetails>,
}

impl GoldRecord {
    pub fn sentences(&self) -> Vec<String> {
        self.context
            .sents
            .iter()
            .map(|sentence| sentence.sent.clone())
            .collect()
    }

    pub fn document(&self, separator: &str) -> String {
        self.sentences().join(separator)
    }

    pub fn location_hint(&self) -> Option<String> {
        let media = self.media_dets.as_ref()?;
        let parts = [media.location_name.as_deref(), media.state.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<&str>>();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

fn deserialize_region_key<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(key)) if !key.trim().is_empty() => Some(key.trim().to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(alias = "toponym")]
    pub name: String,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lon")]
    pub longitude: Option<f64>,
    #[serde(default, alias = "src")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contained_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diversity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl Candidate {
    pub fn new(name: impl Into<String>, coordinate: Coordinate, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        self.coordinate().point()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched,
    NotMatched,
    Indeterminate,
}

impl MatchOutcome {
    pub fn matched_ref(self) -> Option<bool> {
        match self {
            Self::Matched => Some(true),
            Self::NotMatched => Some(false),
            Self::Indeterminate => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::NotMatched => "not_matched",
            Self::Indeterminate => "indeterminate",
        }
    }
}

impl From<bool> for MatchOutcome {
    fn from(matched: bool) -> Self {
        if matched {
            Self::Matched
        } else {
            Self::NotMatched
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionTally {
    #[serde(rename = "TP")]
    pub true_positive: usize,
    #[serde(rename = "TN")]
    pub true_negative: Option<usize>,
    #[serde(rename = "FP")]
    pub false_positive: usize,
    #[serde(rename = "FN")]
    pub false_negative: usize,
}

impl ConfusionTally {
    pub fn record(&mut self, outcome: MatchOutcome) {
        match outcome {
            MatchOutcome::Matched => self.true_positive += 1,
            MatchOutcome::NotMatched => self.false_positive += 1,
            MatchOutcome::Indeterminate => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.false_negative
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EvaluationMetrics {
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunParams {
    pub resolver: String,
    pub radius_miles: f64,
    pub merge_radius_miles: Option<f64>,
    pub boundaries_dir: String,
    pub similarity: String,
    pub missing_coordinates: String,
    pub sentence_separator: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub records_evaluated: usize,
    pub malformed_lines: usize,
    pub resolver_errors: usize,
    pub empty_resolutions: usize,
    pub boundary_checks: usize,
    pub missing_boundaries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPlaces {
    pub toponym: Vec<Candidate>,
    pub candidate_count: usize,
    pub matched_ref: Option<bool>,
    pub outcome: MatchOutcome,
    pub distance_miles: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedPlaces {
    pub fn indeterminate(toponym: Vec<Candidate>, candidate_count: usize) -> Self {
        Self {
            toponym,
            candidate_count,
            matched_ref: None,
            outcome: MatchOutcome::Indeterminate,
            distance_miles: None,
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::indeterminate(Vec::new(), 0)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Experiment {
    pub reference_place: Value,
    pub resolved_places: ResolvedPlaces,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub generated_at: String,
    pub gold_sha256: Option<String>,
    pub params: RunParams,
    pub conf_mat: ConfusionTally,
    pub metrics: EvaluationMetrics,
    pub counts: RunCounts,
    pub runtime_seconds: f64,
    pub experiments: Vec<Experiment>,
}

#[cfg(test)]
mod tests {
    use super::{Candidate, ConfusionTally, Coordinate, GoldRecord, MatchOutcome};
    use crate::cli::MissingCoordinates;

    #[test]
    fn gold_record_treats_false_region_key_as_distance_scored() {
        let raw = r#"
        {
          "entity": "Norfolk",
          "lat_long": [36.8508, -76.2859],
          "is_state": false,
          "context": {"sents": [{"sent": "Norfolk approved the budget"}, {"sent": "More later"}]}
        }
        "#;

        let record: GoldRecord = serde_json::from_str(raw).expect("gold row should deserialize");
        assert!(record.region_key.is_none());
        assert_eq!(record.lat_long, Coordinate::known(36.8508, -76.2859));
        assert_eq!(record.document("."), "Norfolk approved the budget.More later");
        assert!(record.location_hint().is_none());
    }

    #[test]
    fn gold_record_reads_region_key_and_media_hint() {
        let raw = r#"
        {
          "entity": "Virginia",
          "lat_long": [null, -78.0],
          "is_state": "virginia.geojson",
          "media_dets": {"location_name": "Richmond", "state": "VA"}
        }
        "#;

        let record: GoldRecord = serde_json::from_str(raw).expect("gold row should deserialize");
        assert_eq!(record.region_key.as_deref(), Some("virginia.geojson"));
        assert_eq!(record.lat_long.latitude, None);
        assert_eq!(record.location_hint().as_deref(), Some("Richmond, VA"));
        assert!(record.sentences().is_empty());
    }

    #[test]
    fn coordinate_resolution_follows_missing_policy() {
        let partial = Coordinate {
            latitude: Some(12.5),
            longitude: None,
        };

        assert!(partial.resolve(MissingCoordinates::Indeterminate).is_none());
        let zeroed = partial
            .resolve(MissingCoordinates::Zero)
            .expect("zero policy always yields a point");
        assert_eq!(zeroed.latitude, 12.5);
        assert_eq!(zeroed.longitude, 0.0);
    }

    #[test]
    fn candidate_accepts_gazetteer_field_aliases() {
        let raw = r#"{"toponym": "Portsmouth", "lat": 36.83, "lon": -76.29, "src": "geonames"}"#;
        let candidate: Candidate = serde_json::from_str(raw).expect("candidate should deserialize");
        assert_eq!(candidate.name, "Portsmouth");
        assert_eq!(candidate.source, "geonames");
        assert!(candidate.point().is_some());
    }

    #[test]
    fn tally_increments_exactly_one_counter() {
        let mut tally = ConfusionTally::default();
        tally.record(MatchOutcome::Matched);
        tally.record(MatchOutcome::Indeterminate);
        tally.record(MatchOutcome::Indeterminate);

        assert_eq!(tally.true_positive, 1);
        assert_eq!(tally.false_positive, 0);
        assert_eq!(tally.false_negative, 2);
        assert_eq!(tally.total(), 3);

        let json = serde_json::to_value(tally).expect("tally serializes");
        assert_eq!(json["TN"], serde_json::Value::Null);
        assert_eq!(json["FN"], 2);
    }
}
