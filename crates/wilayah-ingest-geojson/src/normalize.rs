//! Geometry normalization before storage.
//!
//! Always the same three steps, in this order:
//! 1. drop every coordinate dimension past x/y,
//! 2. simplify with topology preservation,
//! 3. coerce to a `MultiPolygon`.
//!
//! Simplification is Douglas-Peucker at a distance tolerance: a vertex is
//! dropped when it lies within the tolerance of the simplified outline. The
//! result is kept only if every ring still closes with at least three
//! distinct points and no two edges cross. Otherwise the geometry falls back
//! to topology-preserving Visvalingam-Whyatt, whose area threshold is
//! `tolerance * tolerance`.

use geo::{Intersects, Simplify, SimplifyVwPreserve};
use geo_types::{Geometry, Line, LineString, MultiPolygon};
use geojson::Value;

/// Simplification tolerance in the geometry's native units (degrees).
pub const SIMPLIFY_TOLERANCE: f64 = 0.0001;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("feature has no geometry")]
    Missing,
    #[error("position has {0} coordinate(s), need at least 2")]
    ShortPosition(usize),
    #[error("unsupported geometry type `{0}`, only polygonal boundaries are stored")]
    Unsupported(&'static str),
    #[error("invalid geometry: {0}")]
    Invalid(String),
}

/// Run the normalization pipeline on one feature geometry.
pub fn normalize(
    geometry: Option<&geojson::Geometry>,
    tolerance: f64,
) -> Result<MultiPolygon<f64>, NormalizeError> {
    let geometry = geometry.ok_or(NormalizeError::Missing)?;
    let flat = force_2d(&geometry.value)?;
    let geometry: Geometry<f64> = Geometry::try_from(flat)
        .map_err(|e: geojson::Error| NormalizeError::Invalid(e.to_string()))?;

    let multi = match geometry {
        Geometry::Polygon(p) => MultiPolygon(vec![p]),
        Geometry::MultiPolygon(mp) => mp,
        other => return Err(NormalizeError::Unsupported(type_name(&other))),
    };
    Ok(simplify(&multi, tolerance))
}

fn simplify(multi: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    let simplified = multi.simplify(&tolerance);
    if rings(&simplified).all(|ring| ring.0.len() >= 4) && !has_crossing(&simplified) {
        return simplified;
    }
    tracing::debug!(tolerance, "distance simplification breaks topology, using area threshold");
    multi.simplify_vw_preserve(&(tolerance * tolerance))
}

fn rings(multi: &MultiPolygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    multi
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
}

struct Edge {
    ring: usize,
    index: usize,
    ring_edges: usize,
    line: Line<f64>,
    min_x: f64,
    max_x: f64,
}

impl Edge {
    fn adjacent(&self, other: &Edge) -> bool {
        let gap = self.index.abs_diff(other.index);
        self.ring == other.ring && (gap == 1 || gap + 1 == self.ring_edges)
    }
}

/// Whether any two non-adjacent edges of `multi` touch or cross.
///
/// Edges are swept in order of their smallest x so only edges whose x
/// ranges overlap are compared.
fn has_crossing(multi: &MultiPolygon<f64>) -> bool {
    let mut edges = Vec::new();
    for (ring, line_string) in rings(multi).enumerate() {
        let ring_edges = line_string.0.len().saturating_sub(1);
        for (index, line) in line_string.lines().enumerate() {
            let (min_x, max_x) = if line.start.x <= line.end.x {
                (line.start.x, line.end.x)
            } else {
                (line.end.x, line.start.x)
            };
            edges.push(Edge {
                ring,
                index,
                ring_edges,
                line,
                min_x,
                max_x,
            });
        }
    }
    edges.sort_by(|a, b| a.min_x.total_cmp(&b.min_x));

    for (i, a) in edges.iter().enumerate() {
        for b in &edges[i + 1..] {
            if b.min_x > a.max_x {
                break;
            }
            if !a.adjacent(b) && a.line.intersects(&b.line) {
                return true;
            }
        }
    }
    false
}

fn force_2d(value: &Value) -> Result<Value, NormalizeError> {
    fn pos(p: &[f64]) -> Result<Vec<f64>, NormalizeError> {
        match p {
            [x, y, ..] => Ok(vec![*x, *y]),
            _ => Err(NormalizeError::ShortPosition(p.len())),
        }
    }
    fn ring(r: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, NormalizeError> {
        r.iter().map(|p| pos(p)).collect()
    }
    fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<Vec<f64>>>, NormalizeError> {
        rings.iter().map(|r| ring(r)).collect()
    }

    Ok(match value {
        Value::Polygon(rings) => Value::Polygon(polygon(rings)?),
        Value::MultiPolygon(polys) => {
            Value::MultiPolygon(polys.iter().map(|p| polygon(p)).collect::<Result<_, _>>()?)
        }
        Value::Point(_) => return Err(NormalizeError::Unsupported("Point")),
        Value::MultiPoint(_) => return Err(NormalizeError::Unsupported("MultiPoint")),
        Value::LineString(_) => return Err(NormalizeError::Unsupported("LineString")),
        Value::MultiLineString(_) => return Err(NormalizeError::Unsupported("MultiLineString")),
        Value::GeometryCollection(_) => {
            return Err(NormalizeError::Unsupported("GeometryCollection"))
        }
    })
}

fn type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn geometry(json: &str) -> geojson::Geometry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn polygon_becomes_single_part_multipolygon() {
        let g = geometry(
            r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]}"#,
        );
        let mp = normalize(Some(&g), SIMPLIFY_TOLERANCE).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn third_dimension_is_dropped() {
        let g = geometry(
            r#"{"type": "MultiPolygon", "coordinates": [[[[0.0, 0.0, 12.5], [1.0, 0.0, 3.0], [1.0, 1.0, 0.0], [0.0, 0.0, 1.0]]]]}"#,
        );
        let mp = normalize(Some(&g), SIMPLIFY_TOLERANCE).unwrap();
        let first = mp.0[0].exterior().0[0];
        assert_eq!((first.x, first.y), (0.0, 0.0));
    }

    #[test]
    fn near_collinear_vertices_are_simplified_away() {
        // The midpoint of the bottom edge is off the line by far less than
        // the tolerance.
        let g = geometry(
            r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [0.5, 0.00000001], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]}"#,
        );
        let mp = normalize(Some(&g), SIMPLIFY_TOLERANCE).unwrap();
        assert_eq!(mp.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn vertex_within_distance_tolerance_is_dropped() {
        // 0.00005 off a one-degree edge is inside the 0.0001 tolerance even
        // though the triangle it spans is large.
        let g = geometry(
            r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [0.5, 0.00005], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]}"#,
        );
        let mp = normalize(Some(&g), SIMPLIFY_TOLERANCE).unwrap();
        assert_eq!(mp.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn vertex_outside_distance_tolerance_is_kept() {
        let g = geometry(
            r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [0.5, 0.0002], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]}"#,
        );
        let mp = normalize(Some(&g), SIMPLIFY_TOLERANCE).unwrap();
        assert_eq!(mp.0[0].exterior().0.len(), 6);
    }

    #[test]
    fn simplification_never_pushes_a_hole_outside_its_shell() {
        // Dropping the small dent at (0.5, -0.00008) would straighten the
        // bottom edge through the hole. The dent has to stay.
        let g = geometry(
            r#"{"type": "Polygon", "coordinates": [
                [[0.0, 0.0], [0.4, 0.0], [0.5, -0.00008], [0.6, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]],
                [[0.49, -0.00005], [0.5, 0.1], [0.51, -0.00005], [0.49, -0.00005]]
            ]}"#,
        );
        let mp = normalize(Some(&g), SIMPLIFY_TOLERANCE).unwrap();
        let polygon = &mp.0[0];
        assert!(polygon
            .exterior()
            .0
            .iter()
            .any(|c| c.x == 0.5 && c.y == -0.00008));
        assert_eq!(polygon.interiors().len(), 1);
        assert!(!has_crossing(&mp));
    }

    #[test]
    fn crossing_edges_are_detected() {
        let bowtie = MultiPolygon(vec![geo_types::polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        assert!(has_crossing(&bowtie));

        let square = MultiPolygon(vec![geo_types::polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        assert!(!has_crossing(&square));
    }

    #[test]
    fn coarse_detail_survives() {
        let g = geometry(
            r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [0.5, 0.2], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]}"#,
        );
        let mp = normalize(Some(&g), SIMPLIFY_TOLERANCE).unwrap();
        assert_eq!(mp.0[0].exterior().0.len(), 6);
    }

    #[test]
    fn non_polygonal_geometry_is_unsupported() {
        let g = geometry(r#"{"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}"#);
        assert_eq!(
            normalize(Some(&g), SIMPLIFY_TOLERANCE),
            Err(NormalizeError::Unsupported("LineString"))
        );
        assert_eq!(
            normalize(None, SIMPLIFY_TOLERANCE),
            Err(NormalizeError::Missing)
        );
    }
}
