//! Axis-aligned bounds of an object's rendered geometry.

use worldtrace_types::{Bounds, Geometry};

/// Compute the min/max corners over every vertex of `geometry`.
///
/// Returns `None` when the geometry has no vertices; no size event is
/// emitted for such objects.
pub fn compute_bounds(geometry: &Geometry) -> Option<Bounds> {
    Bounds::enclosing(&geometry.vertices)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use worldtrace_types::Vector3;

    use super::*;

    #[test]
    fn empty_geometry_has_no_bounds() {
        assert!(compute_bounds(&Geometry::default()).is_none());
    }

    #[test]
    fn bounds_span_all_vertices() {
        let geometry = Geometry {
            vertices: vec![
                Vector3::new(0.5, -1.0, 2.0),
                Vector3::new(-0.5, 3.0, 0.0),
                Vector3::new(0.0, 0.0, -4.0),
            ],
        };
        let bounds = compute_bounds(&geometry).unwrap();
        assert_eq!(bounds.min, Vector3::new(-0.5, -1.0, -4.0));
        assert_eq!(bounds.max, Vector3::new(0.5, 3.0, 2.0));
    }

    #[test]
    fn single_vertex_is_degenerate_box() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        let bounds = compute_bounds(&Geometry { vertices: vec![p] }).unwrap();
        assert_eq!(bounds.min, p);
        assert_eq!(bounds.max, p);
    }
}
