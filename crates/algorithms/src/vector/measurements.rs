//! Polygonal measurements and extraction

use geo::{Area as GeoArea, Geometry, MultiPolygon, Polygon};

/// Unsigned area of a geometry in CRS units squared.
///
/// Non-polygonal geometries have zero area. For geographic CRSs this is in
/// square degrees; project to an equal-area plane for square metres.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::Triangle(t) => t.unsigned_area(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(area).sum(),
        _ => 0.0,
    }
}

/// Every polygon with positive area inside a geometry, flattened.
///
/// Points and lines are dropped, so the result of an overlay that touches
/// only along an edge is empty.
pub fn polygonal_parts(geom: &Geometry<f64>) -> MultiPolygon<f64> {
    let mut parts: Vec<Polygon<f64>> = Vec::new();
    collect_polygons(geom, &mut parts);
    parts.retain(|p| p.unsigned_area() > 0.0);
    MultiPolygon::new(parts)
}

fn collect_polygons(geom: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geom {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| collect_polygons(g, out)),
        _ => {}
    }
}

/// Collapse a multipolygon to a plain polygon when it has a single part
pub fn simplest_geometry(mut mp: MultiPolygon<f64>) -> Geometry<f64> {
    if mp.0.len() == 1 {
        if let Some(p) = mp.0.pop() {
            return Geometry::Polygon(p);
        }
    }
    Geometry::MultiPolygon(mp)
}
