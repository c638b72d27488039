//! Uniform offset of polygonal geometries
//!
//! Positive distances grow a geometry outward with rounded corners;
//! negative distances erode it, and a large enough erosion leaves nothing.

use super::measurements::polygonal_parts;
use geo::{Area, Buffer, Geometry, MultiPolygon};

/// Offset the polygonal parts of `geom` by `distance` (CRS units).
///
/// A zero distance returns the polygonal parts unchanged.
pub fn buffer_polygonal(geom: &Geometry<f64>, distance: f64) -> MultiPolygon<f64> {
    let parts = polygonal_parts(geom);
    if distance == 0.0 || parts.0.is_empty() {
        return parts;
    }
    let buffered = parts.buffer(distance);
    MultiPolygon::new(buffered.0.into_iter().filter(|p| p.unsigned_area() > 0.0).collect())
}

/// Area of `geom` after offsetting it by `distance`
pub fn buffered_area(geom: &Geometry<f64>, distance: f64) -> f64 {
    buffer_polygonal(geom, distance).unsigned_area()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Point, Polygon};

    fn square() -> Geometry<f64> {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0),
            ]),
            vec![],
        ))
    }

    #[test]
    fn test_grow_square() {
        // 100 + perimeter·d + π·d²
        let area = buffered_area(&square(), 1.0);
        let expected = 100.0 + 40.0 + std::f64::consts::PI;
        assert!((area - expected).abs() < 0.5, "area {}", area);
    }

    #[test]
    fn test_shrink_square() {
        let area = buffered_area(&square(), -1.0);
        assert!((area - 64.0).abs() < 0.01, "area {}", area);
    }

    #[test]
    fn test_shrink_to_nothing() {
        assert!(buffer_polygonal(&square(), -6.0).0.is_empty());
    }

    #[test]
    fn test_zero_distance_and_non_polygonal() {
        assert!((buffered_area(&square(), 0.0) - 100.0).abs() < 1e-12);
        assert!(buffer_polygonal(&Geometry::Point(Point::new(0.0, 0.0)), 5.0).0.is_empty());
    }
}
