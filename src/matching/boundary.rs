use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path};

use anyhow::{Context, Result, bail};
use geo::{Contains, Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::GeoPoint;

#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    region_key: String,
    shape: MultiPolygon<f64>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
}

impl Boundary {
    pub fn from_geojson(region_key: &str, raw: &[u8]) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_slice(raw)
            .with_context(|| format!("invalid boundary document for {region_key}"))?;

        let geometry = collection
            .features
            .into_iter()
            .next()
            .and_then(|feature| feature.geometry)
            .with_context(|| format!("boundary for {region_key} has no feature geometry"))?;

        let polygons = match geometry {
            Geometry::Polygon { coordinates } => vec![polygon_from_rings(&coordinates)?],
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .map(|rings| polygon_from_rings(rings))
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(Self {
            region_key: region_key.to_string(),
            shape: MultiPolygon::new(polygons),
        })
    }

    pub fn region_key(&self) -> &str {
        &self.region_key
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.shape.contains(&point.to_point())
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| line_string(ring));
    let exterior = rings.next().context("polygon has no exterior ring")??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn line_string(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    let coords = positions
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => bail!("position needs at least two members, got {}", position.len()),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LineString::from(coords))
}

pub fn load_boundary(boundaries_dir: &Path, region_key: &str) -> Option<Boundary> {
    if !is_plain_file_name(region_key) {
        warn!(region_key, "region key is not a plain file name");
        return None;
    }
    let path = boundaries_dir.join(region_key);

    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(region_key, path = %path.display(), "no boundary file found");
            return None;
        }
        Err(err) => {
            warn!(region_key, path = %path.display(), error = %err, "failed to read boundary file");
            return None;
        }
    };

    match Boundary::from_geojson(region_key, &raw) {
        Ok(boundary) => {
            debug!(region_key = boundary.region_key(), path = %path.display(), "loaded boundary");
            Some(boundary)
        }
        Err(err) => {
            warn!(region_key, path = %path.display(), error = %format!("{err:#}"), "ignoring malformed boundary file");
            None
        }
    }
}

fn is_plain_file_name(region_key: &str) -> bool {
    let mut components = Path::new(region_key).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !region_key.contains(['/', '\\'])
}

// Fails closed: no boundary means no match.
pub fn within(point: GeoPoint, boundary: Option<&Boundary>) -> bool {
    boundary.is_some_and(|boundary| boundary.contains(point))
}

#[cfg(test)]
mod tests {
    use super::{Boundary, load_boundary, within};
    use crate::model::GeoPoint;

    const SQUARE: &str = r#"
    {
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "properties": {"name": "tidewater"},
          "geometry": {
            "type": "Polygon",
            "coordinates": [
              [[-77.0, 36.0], [-76.0, 36.0], [-76.0, 37.0], [-77.0, 37.0], [-77.0, 36.0]],
              [[-76.6, 36.4], [-76.4, 36.4], [-76.4, 36.6], [-76.6, 36.6], [-76.6, 36.4]]
            ]
          }
        }
      ]
    }
    "#;

    #[test]
    fn within_without_boundary_is_false() {
        assert!(!within(GeoPoint::new(0.0, 0.0), None));
        assert!(!within(GeoPoint::new(36.8, -76.3), None));
    }

    #[test]
    fn point_is_transposed_before_containment() {
        let boundary = Boundary::from_geojson("tidewater", SQUARE.as_bytes()).expect("valid boundary");

        assert!(within(GeoPoint::new(36.8, -76.3), Some(&boundary)));
        assert!(!within(GeoPoint::new(-76.3, 36.8), Some(&boundary)));
    }

    #[test]
    fn interior_ring_is_a_hole() {
        let boundary = Boundary::from_geojson("tidewater", SQUARE.as_bytes()).expect("valid boundary");
        assert!(!within(GeoPoint::new(36.5, -76.5), Some(&boundary)));
    }

    #[test]
    fn multipolygon_with_altitude_positions_is_accepted() {
        let raw = r#"
        {"features": [{"geometry": {"type": "MultiPolygon", "coordinates": [
          [[[0.0, 0.0, 5.0], [1.0, 0.0, 5.0], [1.0, 1.0, 5.0], [0.0, 1.0, 5.0], [0.0, 0.0, 5.0]]],
          [[[10.0, 10.0], [11.0, 10.0], [11.0, 11.0], [10.0, 11.0], [10.0, 10.0]]]
        ]}}]}
        "#;

        let boundary = Boundary::from_geojson("islands", raw.as_bytes()).expect("valid boundary");
        assert_eq!(boundary.region_key(), "islands");
        assert!(boundary.contains(GeoPoint::new(0.5, 0.5)));
        assert!(boundary.contains(GeoPoint::new(10.5, 10.5)));
        assert!(!boundary.contains(GeoPoint::new(5.0, 5.0)));
    }

    #[test]
    fn missing_boundary_file_is_reported_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");

        let boundary = load_boundary(dir.path(), "does-not-exist");
        assert!(boundary.is_none());
        assert!(!within(GeoPoint::new(36.8, -76.3), boundary.as_ref()));
    }

    #[test]
    fn malformed_boundary_file_is_reported_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken"), r#"{"features": [{"geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}]}"#)
            .expect("write");
        std::fs::write(dir.path().join("empty"), r#"{"features": []}"#).expect("write");

        assert!(load_boundary(dir.path(), "broken").is_none());
        assert!(load_boundary(dir.path(), "empty").is_none());
    }

    #[test]
    fn region_keys_outside_the_directory_are_refused() {
        let root = tempfile::tempdir().expect("tempdir");
        let boundaries = root.path().join("boundaries");
        std::fs::create_dir(&boundaries).expect("mkdir");
        std::fs::write(root.path().join("VA"), SQUARE).expect("write");
        let absolute = root.path().join("VA").display().to_string();

        for key in ["../VA", absolute.as_str(), "nested/VA", "..", ".", ""] {
            assert!(load_boundary(&boundaries, key).is_none(), "key {key:?} should be refused");
        }
    }

    #[test]
    fn boundary_is_loaded_by_region_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("VA"), SQUARE).expect("write");

        let boundary = load_boundary(dir.path(), "VA").expect("boundary should load");
        assert_eq!(boundary.region_key(), "VA");
        assert!(within(GeoPoint::new(36.9, -76.9), Some(&boundary)));
    }
}
