mod llm_text;
mod replay;

use anyhow::Result;
use serde_json::Value;

use crate::model::Candidate;

pub use llm_text::LlmCoordinateParser;
pub use replay::ReplayResolver;

#[derive(Debug, Clone, Copy)]
pub struct ResolveQuery<'a> {
    pub entity: &'a str,
    pub document: &'a str,
    pub sentences: &'a [String],
    pub location_hint: Option<&'a str>,
    pub record: &'a Value,
}

pub trait PlaceResolver {
    fn name(&self) -> &str;

    fn resolve(&self, query: &ResolveQuery<'_>) -> Result<Vec<Candidate>>;
}
