//! GeoJSON boundary-file reading for Wilayah
//!
//! Turns the body of one boundary file into a [`SourceBatch`]:
//! - the batch level comes from the caller (the file's declared source tag),
//! - each feature's properties are read with that level's shape,
//! - features whose properties cannot be read at all are reported in
//!   [`SourceBatch::rejected`] instead of failing the whole file.
//!
//! Geometry is carried through untouched; [`normalize`] does the fixed
//! force-2D → simplify → multi-part pipeline before storage.

pub mod normalize;

pub use normalize::{normalize, NormalizeError, SIMPLIFY_TOLERANCE};

use geojson::{Feature, GeoJson};
use serde_json::Value;
use wilayah_code::{Level, RawProperties};

#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("invalid GeoJSON: {0}")]
    Parse(#[from] geojson::Error),
    #[error("expected a Feature or FeatureCollection, found a bare geometry")]
    BareGeometry,
}

/// One feature of a source file, with its properties read for the batch level.
#[derive(Debug, Clone)]
pub struct RawFeature {
    /// Position of the feature in the source file.
    pub index: usize,
    pub properties: RawProperties,
    pub geometry: Option<geojson::Geometry>,
}

/// A feature whose property bag could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFeature {
    pub index: usize,
    pub reason: String,
}

/// All features of one source file, declared for a single level.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub level: Level,
    pub features: Vec<RawFeature>,
    pub rejected: Vec<RejectedFeature>,
}

impl SourceBatch {
    /// Total number of features found in the source.
    pub fn len(&self) -> usize {
        self.features.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse GeoJSON text into a batch for `level`.
pub fn parse_source(text: &str, level: Level) -> Result<SourceBatch, GeoJsonError> {
    let geojson: GeoJson = text.parse()?;
    from_geojson(geojson, level)
}

/// Build a batch from an already parsed GeoJSON document.
pub fn from_geojson(geojson: GeoJson, level: Level) -> Result<SourceBatch, GeoJsonError> {
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => return Err(GeoJsonError::BareGeometry),
    };

    let mut batch = SourceBatch {
        level,
        features: Vec::with_capacity(features.len()),
        rejected: Vec::new(),
    };

    for (index, feature) in features.into_iter().enumerate() {
        match read_feature(index, feature, level) {
            Ok(raw) => batch.features.push(raw),
            Err(reason) => {
                tracing::warn!(index, level = level.as_u8(), %reason, "rejecting source feature");
                batch.rejected.push(RejectedFeature { index, reason });
            }
        }
    }

    Ok(batch)
}

fn read_feature(index: usize, feature: Feature, level: Level) -> Result<RawFeature, String> {
    let Feature {
        geometry,
        properties,
        ..
    } = feature;
    let bag = Value::Object(properties.unwrap_or_default());
    let properties = RawProperties::deserialize_for(level, bag)
        .map_err(|e| format!("unreadable properties: {e}"))?;
    Ok(RawFeature {
        index,
        properties,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISTRICTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"kode_prov": "11", "kode_kab": "01", "kode_kec": "0105", "kecamatan": "Bakongan"},
                "geometry": {"type": "Polygon", "coordinates": [[[97.0, 3.0], [97.1, 3.0], [97.1, 3.1], [97.0, 3.0]]]}
            },
            {
                "type": "Feature",
                "properties": {"kode_prov": ["not", "a", "code"]},
                "geometry": null
            },
            {
                "type": "Feature",
                "properties": null,
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn collection_features_are_read_for_the_batch_level() {
        let batch = parse_source(DISTRICTS, Level::District).unwrap();
        assert_eq!(batch.level, Level::District);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.features.len(), 2);
        assert!(matches!(
            batch.features[0].properties,
            RawProperties::District(ref f) if f.kecamatan.as_deref() == Some("Bakongan")
        ));
        assert!(batch.features[0].geometry.is_some());
        // A null property bag still reads; derivation reports what is missing.
        assert_eq!(batch.features[1].index, 2);
    }

    #[test]
    fn unreadable_property_bags_are_rejected_individually() {
        let batch = parse_source(DISTRICTS, Level::District).unwrap();
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
    }

    #[test]
    fn single_feature_is_a_batch_of_one() {
        let text = r#"{"type": "Feature", "properties": {"kode_prov": 11, "provinsi": "Aceh"}, "geometry": null}"#;
        let batch = parse_source(text, Level::Province).unwrap();
        assert_eq!(batch.features.len(), 1);
    }

    #[test]
    fn bare_geometry_is_refused() {
        let text = r#"{"type": "Point", "coordinates": [97.0, 3.0]}"#;
        assert!(matches!(
            parse_source(text, Level::Province),
            Err(GeoJsonError::BareGeometry)
        ));
        assert!(matches!(
            parse_source("not json", Level::Province),
            Err(GeoJsonError::Parse(_))
        ));
    }
}
