use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{Candidate, Coordinate, GoldContext};

use super::{LlmCoordinateParser, PlaceResolver, ResolveQuery};

#[derive(Debug, Deserialize)]
struct CapturedResolution {
    entity: String,
    #[serde(default)]
    disambiguated_info: Option<DisambiguatedInfo>,
    #[serde(default)]
    toponyms: Option<Vec<Candidate>>,
    #[serde(default)]
    source: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DisambiguatedInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    complete_response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceContext {
    #[serde(default)]
    context: GoldContext,
}

type ContextKey = (String, Vec<String>);

// Answers are looked up by the full source record first. The (entity, context)
// key only answers when every capture sharing it agrees.
#[derive(Debug)]
pub struct ReplayResolver {
    name: String,
    parser: LlmCoordinateParser,
    by_record: HashMap<String, Vec<Candidate>>,
    by_context: HashMap<ContextKey, Option<Vec<Candidate>>>,
    gold_records: Vec<Value>,
    malformed_entries: usize,
}

impl ReplayResolver {
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read resolutions: {}", path.display()))?;

        let mut malformed = 0_usize;
        let values = if raw.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<Value>>(&raw)
                .with_context(|| format!("failed to parse resolutions: {}", path.display()))?
        } else {
            let mut values = Vec::new();
            for (line_index, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(line) {
                    Ok(value) => values.push(value),
                    Err(err) => {
                        malformed += 1;
                        warn!(line = line_index + 1, error = %err, "skipping malformed resolution line");
                    }
                }
            }
            values
        };

        let mut resolver = Self::from_entries(name, values)?;
        resolver.malformed_entries += malformed;

        info!(
            path = %path.display(),
            records = resolver.by_record.len(),
            contexts = resolver.by_context.len(),
            gold_records = resolver.gold_records.len(),
            malformed = resolver.malformed_entries,
            "loaded captured resolutions"
        );

        Ok(resolver)
    }

    pub fn from_entries(name: &str, values: Vec<Value>) -> Result<Self> {
        let mut resolver = Self {
            name: name.to_string(),
            parser: LlmCoordinateParser::new()?,
            by_record: HashMap::new(),
            by_context: HashMap::new(),
            gold_records: Vec::new(),
            malformed_entries: 0,
        };

        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<CapturedResolution>(value) {
                Ok(entry) => resolver.insert(entry),
                Err(err) => {
                    resolver.malformed_entries += 1;
                    warn!(entry = index, error = %err, "skipping malformed resolution entry");
                }
            }
        }

        Ok(resolver)
    }

    pub fn gold_records(&self) -> &[Value] {
        &self.gold_records
    }

    pub fn malformed_entries(&self) -> usize {
        self.malformed_entries
    }

    fn insert(&mut self, entry: CapturedResolution) {
        let candidates = self.captured_candidates(&entry.entity, entry.disambiguated_info, entry.toponyms);
        let sentences = entry
            .source
            .as_ref()
            .map(source_sentences)
            .unwrap_or_default();

        match self.by_context.entry((entry.entity.clone(), sentences)) {
            Entry::Vacant(slot) => {
                slot.insert(Some(candidates.clone()));
            }
            Entry::Occupied(mut slot) => {
                if slot.get().as_ref().is_some_and(|existing| *existing != candidates) {
                    debug!(entity = %entry.entity, "context shared by captures with different answers");
                    slot.insert(None);
                }
            }
        }

        if let Some(source) = entry.source {
            match self.by_record.entry(record_key(&source)) {
                Entry::Vacant(slot) => {
                    slot.insert(candidates);
                }
                Entry::Occupied(slot) => {
                    if *slot.get() != candidates {
                        warn!(
                            entity = %entry.entity,
                            "duplicate source record captured with different answers; keeping the first"
                        );
                    }
                }
            }
            self.gold_records.push(source);
        }
    }

    fn captured_candidates(
        &self,
        entity: &str,
        info: Option<DisambiguatedInfo>,
        toponyms: Option<Vec<Candidate>>,
    ) -> Vec<Candidate> {
        if let Some(mut toponyms) = toponyms {
            for candidate in toponyms.iter_mut().filter(|c| c.source.is_empty()) {
                candidate.source = self.name.clone();
            }
            return toponyms;
        }

        let Some(info) = info else {
            return Vec::new();
        };

        let mut coordinate = Coordinate {
            latitude: info.latitude,
            longitude: info.longitude,
        };
        if coordinate.latitude.is_none() && coordinate.longitude.is_none() {
            if let Some(point) = info
                .complete_response
                .as_deref()
                .and_then(|text| self.parser.parse(text))
            {
                coordinate = Coordinate::known(point.latitude, point.longitude);
            }
        }
        if coordinate.latitude.is_none() && coordinate.longitude.is_none() {
            return Vec::new();
        }

        let name = info.name.unwrap_or_else(|| entity.to_string());
        let mut candidate = Candidate::new(name, coordinate, self.name.as_str());
        candidate.raw_response = info.complete_response;
        vec![candidate]
    }
}

fn record_key(record: &Value) -> String {
    // Object keys serialize sorted, so equal records give equal keys.
    record.to_string()
}

fn source_sentences(source: &Value) -> Vec<String> {
    serde_json::from_value::<SourceContext>(source.clone())
        .map(|source| {
            source
                .context
                .sents
                .into_iter()
                .map(|sentence| sentence.sent)
                .collect()
        })
        .unwrap_or_default()
}

impl PlaceResolver for ReplayResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, query: &ResolveQuery<'_>) -> Result<Vec<Candidate>> {
        if let Some(candidates) = self.by_record.get(&record_key(query.record)) {
            return Ok(candidates.clone());
        }

        let exact = (query.entity.to_string(), query.sentences.to_vec());
        let by_entity = (query.entity.to_string(), Vec::new());
        let answer = self
            .by_context
            .get(&exact)
            .or_else(|| self.by_context.get(&by_entity));

        match answer {
            Some(Some(candidates)) => Ok(candidates.clone()),
            Some(None) => {
                debug!(entity = query.entity, "captured answers disagree for this context");
                Ok(Vec::new())
            }
            None => {
                debug!(
                    entity = query.entity,
                    location_hint = query.location_hint,
                    document_chars = query.document.chars().count(),
                    "no captured resolution"
                );
                Ok(Vec::new())
            }
        }
    }
}
