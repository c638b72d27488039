//! Polygon overlay against an R-tree of class polygons

use super::measurements::polygonal_parts;
use super::polygonize::ClassPolygon;
use geo::{BooleanOps, BoundingRect, Geometry, MultiPolygon, Polygon};
use rstar::{RTree, RTreeObject, AABB};

#[derive(Clone)]
struct ClassBox {
    idx: usize,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for ClassBox {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

/// Spatial index over a set of class polygons
pub struct ClassIndex<'a> {
    classes: &'a [ClassPolygon],
    tree: RTree<ClassBox>,
}

impl<'a> ClassIndex<'a> {
    pub fn new(classes: &'a [ClassPolygon]) -> Self {
        let boxes: Vec<ClassBox> = classes
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| {
                let rect = c.polygon.bounding_rect()?;
                Some(ClassBox {
                    idx,
                    env: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();
        Self {
            classes,
            tree: RTree::bulk_load(boxes),
        }
    }

    /// Class polygons whose envelope meets the envelope of `geom`, in input order
    pub fn candidates(&self, geom: &Geometry<f64>) -> Vec<&'a ClassPolygon> {
        let Some(rect) = geom.bounding_rect() else {
            return Vec::new();
        };
        let query = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|b| b.idx)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.classes[i]).collect()
    }
}

/// Polygonal intersection of a geometry with one polygon; empty when they
/// only touch or do not meet.
pub fn intersect_polygon(geom: &Geometry<f64>, polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    let parts = polygonal_parts(geom);
    if parts.0.is_empty() {
        return parts;
    }
    polygonal_parts(&Geometry::MultiPolygon(parts.intersection(polygon)))
}
