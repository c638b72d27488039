//! Axis-aligned envelopes of features and rasters

use geo::{BoundingRect, Geometry};
use hydrorisk_core::raster::{Raster, Window};
use hydrorisk_core::{FeatureCollection, RasterElement};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Window of the cells of `raster` whose footprint overlaps the box,
    /// or `None` when the box misses the grid.
    pub fn raster_window<T: RasterElement>(&self, raster: &Raster<T>) -> Option<Window> {
        let corners = [
            raster.geo_to_pixel(self.min_x, self.min_y),
            raster.geo_to_pixel(self.min_x, self.max_y),
            raster.geo_to_pixel(self.max_x, self.min_y),
            raster.geo_to_pixel(self.max_x, self.max_y),
        ];
        if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
            return None;
        }

        let (rows, cols) = raster.shape();
        let col_lo = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).floor().max(0.0);
        let col_hi = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil().min(cols as f64);
        let row_lo = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor().max(0.0);
        let row_hi = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil().min(rows as f64);
        if col_hi <= col_lo || row_hi <= row_lo {
            return None;
        }

        Some(Window {
            row_off: row_lo as usize,
            col_off: col_lo as usize,
            rows: (row_hi - row_lo) as usize,
            cols: (col_hi - col_lo) as usize,
        })
    }
}

/// Compute the bounding box of a geometry
pub fn bounding_box(geom: &Geometry<f64>) -> Option<BoundingBox> {
    geom.bounding_rect().map(|rect| BoundingBox {
        min_x: rect.min().x,
        min_y: rect.min().y,
        max_x: rect.max().x,
        max_y: rect.max().y,
    })
}

/// Envelope of every geometry in a layer
pub fn layer_envelope(layer: &FeatureCollection) -> Option<BoundingBox> {
    layer
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .filter_map(bounding_box)
        .reduce(|a, b| a.union(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use hydrorisk_core::{Feature, GeoTransform};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_bounding_box() {
        let bb = bounding_box(&Geometry::Polygon(square(0.0, 0.0, 10.0))).unwrap();
        assert_eq!(bb, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(bb.width(), 10.0);
        assert_eq!(bb.height(), 10.0);
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_layer_envelope() {
        let layer: FeatureCollection = vec![
            Feature::new(square(0.0, 0.0, 2.0)),
            Feature::new(square(5.0, -3.0, 1.0)),
        ]
        .into_iter()
        .collect();
        let env = layer_envelope(&layer).unwrap();
        assert_eq!(env, BoundingBox::new(0.0, -3.0, 6.0, 2.0));
        assert!(layer_envelope(&FeatureCollection::new()).is_none());
    }

    #[test]
    fn test_raster_window() {
        // 10×10 grid of 10-unit cells covering x 0..100, y 0..100
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));

        let w = BoundingBox::new(15.0, 72.0, 38.0, 95.0).raster_window(&raster).unwrap();
        assert_eq!((w.row_off, w.col_off, w.rows, w.cols), (0, 1, 3, 3));

        let clipped = BoundingBox::new(-50.0, -50.0, 5.0, 5.0).raster_window(&raster).unwrap();
        assert_eq!((clipped.row_off, clipped.col_off, clipped.rows, clipped.cols), (9, 0, 1, 1));

        assert!(BoundingBox::new(200.0, 200.0, 300.0, 300.0).raster_window(&raster).is_none());
    }
}
