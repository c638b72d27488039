//! Vector operations for the soil risk workflow
//!
//! - Polygonize: raster regions to polygons, and back
//! - Overlay: R-tree candidate search and polygonal intersection
//! - Buffer: uniform offset of polygons
//! - Projection: UTM and Albers equal-area transforms
//! - Measurements and envelopes

mod buffer;
mod measurements;
mod overlay;
mod polygonize;
mod projection;
mod spatial;

pub use buffer::{buffer_polygonal, buffered_area};
pub use measurements::{area, polygonal_parts, simplest_geometry};
pub use overlay::{intersect_polygon, ClassIndex};
pub use polygonize::{polygonize_classes, polygonize_mask, rasterize_mask, ClassPolygon};
pub use projection::{
    transform_geometry, utm_to_wgs84, wgs84_to_utm, AlbersEqualArea, EqualAreaFrame,
};
pub use spatial::{bounding_box, layer_envelope, BoundingBox};
