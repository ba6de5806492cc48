//! Geo Shapes Module
//! Region outlines for the choropleth, parsed from a GeoJSON FeatureCollection.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// One closed ring of (longitude, latitude) points.
pub type Ring = Vec<(f64, f64)>;

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    #[serde(other)]
    Unsupported,
}

/// Outer rings of every region, keyed by country code.
#[derive(Debug, Clone, Default)]
pub struct GeoShapes {
    regions: BTreeMap<String, Vec<Ring>>,
}

impl GeoShapes {
    /// Parse a FeatureCollection, reading each region's code from `code_property`.
    ///
    /// Features without that property or with non-polygon geometry are skipped.
    pub fn from_geojson(text: &str, code_property: &str) -> Result<Self, serde_json::Error> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        let total = collection.features.len();

        let mut shapes = Self::default();
        for feature in collection.features {
            let code = feature
                .properties
                .as_ref()
                .and_then(|props| props.get(code_property))
                .and_then(Value::as_str);
            let (Some(code), Some(geometry)) = (code, feature.geometry) else {
                continue;
            };

            let rings: Vec<Ring> = match geometry {
                Geometry::Polygon { coordinates } => {
                    coordinates.into_iter().take(1).map(to_ring).collect()
                }
                Geometry::MultiPolygon { coordinates } => coordinates
                    .into_iter()
                    .filter_map(|polygon| polygon.into_iter().next())
                    .map(to_ring)
                    .collect(),
                Geometry::Unsupported => continue,
            };

            shapes
                .regions
                .entry(code.to_string())
                .or_default()
                .extend(rings.into_iter().filter(|ring| ring.len() >= 3));
        }

        debug!("Parsed {} regions from {} features", shapes.len(), total);
        Ok(shapes)
    }

    pub fn insert(&mut self, code: impl Into<String>, rings: Vec<Ring>) {
        self.regions.insert(code.into(), rings);
    }

    pub fn get(&self, code: &str) -> Option<&[Ring]> {
        self.regions.get(code).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Ring])> {
        self.regions
            .iter()
            .map(|(code, rings)| (code.as_str(), rings.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn to_ring(points: Vec<Vec<f64>>) -> Ring {
    points
        .into_iter()
        .filter_map(|p| match p.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        })
        .collect()
}
