//! I/O operations for reading and writing geospatial data

mod archive;
mod geojson_io;
mod geotiff;

pub use archive::{read_vector, resolve_vector_input, ResolvedInput};
pub use geojson_io::{parse_geojson, read_geojson, to_geojson_string, write_geojson};
pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
