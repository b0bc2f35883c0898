use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::model::GoldRecord;

#[derive(Debug, Clone)]
pub struct GoldEntry {
    pub raw: Value,
    pub record: GoldRecord,
}

#[derive(Debug, Clone, Default)]
pub struct GoldInput {
    pub entries: Vec<GoldEntry>,
    pub malformed_lines: usize,
}

pub fn read_gold_records(path: &Path) -> Result<GoldInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read gold records: {}", path.display()))?;

    let mut input = GoldInput::default();
    for (line_index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<Value>(line)
            .map_err(anyhow::Error::from)
            .and_then(gold_entry);
        match parsed {
            Ok(entry) => input.entries.push(entry),
            Err(err) => {
                input.malformed_lines += 1;
                warn!(
                    path = %path.display(),
                    line = line_index + 1,
                    error = %format!("{err:#}"),
                    "skipping malformed gold record"
                );
            }
        }
    }

    info!(
        path = %path.display(),
        records = input.entries.len(),
        malformed = input.malformed_lines,
        "loaded gold records"
    );

    Ok(input)
}

pub fn gold_from_values(values: &[Value]) -> GoldInput {
    let mut input = GoldInput::default();
    for (index, value) in values.iter().enumerate() {
        match gold_entry(value.clone()) {
            Ok(entry) => input.entries.push(entry),
            Err(err) => {
                input.malformed_lines += 1;
                warn!(entry = index, error = %format!("{err:#}"), "skipping malformed gold record");
            }
        }
    }
    input
}

fn gold_entry(raw: Value) -> Result<GoldEntry> {
    let record = serde_json::from_value::<GoldRecord>(raw.clone())
        .context("gold record does not match the expected shape")?;
    Ok(GoldEntry { raw, record })
}
