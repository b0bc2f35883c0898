use anyhow::{Context, Result};
use regex::{Captures, Regex};

use crate::model::GeoPoint;

const LAT_LON_PATTERN: &str = r"(?is)latitude\s*:\s*([-+]?(?:\d*\.\d+|\d+))\s*(?:°\s*([NS]))?.*?longitude\s*:\s*([-+]?(?:\d*\.\d+|\d+))\s*(?:°\s*([EW]))?";

#[derive(Debug, Clone)]
pub struct LlmCoordinateParser {
    pattern: Regex,
}

impl LlmCoordinateParser {
    pub fn new() -> Result<Self> {
        let pattern =
            Regex::new(LAT_LON_PATTERN).context("failed to compile coordinate answer regex")?;
        Ok(Self { pattern })
    }

    pub fn parse(&self, text: &str) -> Option<GeoPoint> {
        let captures = self.pattern.captures(text)?;
        let latitude = signed_component(&captures, 1, 2, 'S')?;
        let longitude = signed_component(&captures, 3, 4, 'W')?;
        Some(GeoPoint::new(latitude, longitude))
    }
}

fn signed_component(
    captures: &Captures<'_>,
    value_group: usize,
    hemisphere_group: usize,
    negative_hemisphere: char,
) -> Option<f64> {
    let raw = captures.get(value_group)?.as_str();
    let value = raw.parse::<f64>().ok()?;

    let negate = captures
        .get(hemisphere_group)
        .and_then(|hemisphere| hemisphere.as_str().chars().next())
        .is_some_and(|hemisphere| hemisphere.eq_ignore_ascii_case(&negative_hemisphere));

    if negate && !raw.starts_with('-') {
        Some(-value)
    } else {
        Some(value)
    }
}
