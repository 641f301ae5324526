//! Geometry encoding for writes and normalization on read.

use geo_types::MultiPolygon;
use serde_json::Value;

/// GeoJSON geometry for a normalized multipolygon.
pub fn encode(geometry: &MultiPolygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

/// Parse a stored geometry, whatever shape the backend returned it in.
///
/// Accepts a GeoJSON object or a string containing one. Absent geometry is
/// `None`; so is geometry that cannot be parsed, which is logged.
pub fn decode(code: &str, raw: Option<Value>) -> Option<geojson::Geometry> {
    let parsed = match raw? {
        Value::Null => return None,
        Value::String(text) => serde_json::from_str::<geojson::Geometry>(&text),
        value @ Value::Object(_) => serde_json::from_value::<geojson::Geometry>(value),
        other => {
            tracing::warn!(
                code,
                found = json_kind(&other),
                "stored geometry is neither an object nor a string"
            );
            return None;
        }
    };
    match parsed {
        Ok(geometry) => Some(geometry),
        Err(err) => {
            tracing::warn!(code, error = %err, "malformed stored geometry");
            None
        }
    }
}

/// [`decode`] for backends that return geometry as text.
pub fn decode_text(code: &str, raw: Option<String>) -> Option<geojson::Geometry> {
    decode(code, raw.map(Value::String))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
