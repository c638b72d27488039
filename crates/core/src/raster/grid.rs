//! Georeferenced grid snapshot

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{s, Array2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid with associated
/// geographic metadata (transform and CRS). Pipeline stages borrow rasters
/// immutably and return new ones.
///
/// # Example
///
/// ```ignore
/// use hydrorisk_core::Raster;
///
/// let mut dem: Raster<f64> = Raster::new(100, 100);
/// dem.set(10, 20, 42.0)?;
/// let value = dem.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

/// Rectangular sub-grid in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    /// Tight bounding window of the non-zero, non-nodata cells of a mask.
    ///
    /// Returns `None` when the mask selects nothing.
    pub fn bounding(mask: &Raster<u8>) -> Option<Self> {
        let mut min_row = usize::MAX;
        let mut min_col = usize::MAX;
        let mut max_row = 0;
        let mut max_col = 0;

        for ((row, col), &v) in mask.data().indexed_iter() {
            if v == 0 || mask.is_nodata(v) {
                continue;
            }
            min_row = min_row.min(row);
            min_col = min_col.min(col);
            max_row = max_row.max(row);
            max_col = max_col.max(col);
        }

        if min_row == usize::MAX {
            return None;
        }

        Some(Self {
            row_off: min_row,
            col_off: min_col,
            rows: max_row - min_row + 1,
            cols: max_col - min_col + 1,
        })
    }

    /// Whether the window lies inside a grid of the given shape
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        self.rows > 0
            && self.cols > 0
            && self.row_off + self.rows <= rows
            && self.col_off + self.cols <= cols
    }
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a zero-filled raster with the same georeferencing but a different type
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Create a raster with the same dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    /// Wrap `data` with this raster's georeferencing.
    ///
    /// The shape must match.
    pub fn derive<U: RasterElement>(&self, data: Array2<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let (er, ec) = self.shape();
        let (ar, ac) = data.dim();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata,
        })
    }

    /// Apply `f` to every valid cell; no-data cells become `nodata` in the output
    pub fn map<U, F>(&self, nodata: U, f: F) -> Raster<U>
    where
        U: RasterElement,
        F: Fn(T) -> U,
    {
        let data = self
            .data
            .mapv(|v| if self.is_nodata(v) { nodata } else { f(v) });
        Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: Some(nodata),
        }
    }

    /// Copy of the cells inside `window`, with the transform origin moved
    /// to the window's top-left corner.
    pub fn window(&self, window: Window) -> Result<Self> {
        if !window.fits(self.rows(), self.cols()) {
            return Err(Error::IndexOutOfBounds {
                row: window.row_off + window.rows,
                col: window.col_off + window.cols,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        let data = self
            .data
            .slice(s![
                window.row_off..window.row_off + window.rows,
                window.col_off..window.col_off + window.cols
            ])
            .to_owned();
        Ok(Self {
            data,
            transform: self.transform.shifted(window.col_off, window.row_off),
            crs: self.crs.clone(),
            nodata: self.nodata,
        })
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Ground width of one column
    pub fn cell_width(&self) -> f64 {
        self.transform.cell_width()
    }

    /// Ground height of one row
    pub fn cell_height(&self) -> f64 {
        self.transform.cell_height()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Coordinate conversion

    /// Map coordinates of the centre of pixel (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Convert map coordinates to fractional pixel coordinates
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// (row, col) of the cell containing a map coordinate, if inside the grid
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows() && col < self.cols()).then_some((row, col))
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Whether (row, col) is inside the grid and holds a valid value
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.data
            .get((row, col))
            .is_some_and(|&v| !self.is_nodata(v))
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = (count > 0).then(|| sum / count as f64);

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_statistics_skip_nodata() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f64).unwrap();
            }
        }
        raster.set(9, 9, f64::NAN).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(98.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_window_bounding_and_copy() {
        let mut mask: Raster<u8> = Raster::new(6, 8);
        mask.set_transform(GeoTransform::new(100.0, 60.0, 10.0, -10.0));
        mask.set(2, 3, 1).unwrap();
        mask.set(4, 5, 1).unwrap();

        let w = Window::bounding(&mask).unwrap();
        assert_eq!(
            w,
            Window { row_off: 2, col_off: 3, rows: 3, cols: 3 }
        );

        let sub = mask.window(w).unwrap();
        assert_eq!(sub.shape(), (3, 3));
        assert_eq!(sub.get(0, 0).unwrap(), 1);
        assert_eq!(sub.get(2, 2).unwrap(), 1);
        assert_eq!(sub.pixel_to_geo(0, 0), mask.pixel_to_geo(3, 2));
    }

    #[test]
    fn test_window_of_empty_mask() {
        let mask: Raster<u8> = Raster::new(4, 4);
        assert!(Window::bounding(&mask).is_none());
        let w = Window { row_off: 2, col_off: 2, rows: 3, cols: 1 };
        assert!(mask.window(w).is_err());
    }

    #[test]
    fn test_cell_at() {
        let mut r: Raster<f64> = Raster::new(5, 5);
        r.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        assert_eq!(r.cell_at(15.0, 45.0), Some((0, 1)));
        assert_eq!(r.cell_at(49.9, 0.1), Some((4, 4)));
        assert_eq!(r.cell_at(-1.0, 10.0), None);
        assert_eq!(r.cell_at(10.0, 51.0), None);
    }

    #[test]
    fn test_map_propagates_nodata() {
        let mut r: Raster<f64> = Raster::from_vec(vec![1.0, -9999.0, 3.0, 4.0], 2, 2).unwrap();
        r.set_nodata(Some(-9999.0));
        let m: Raster<u8> = r.map(255, |v| (v > 2.0) as u8);
        assert_eq!(m.get(0, 0).unwrap(), 0);
        assert_eq!(m.get(0, 1).unwrap(), 255);
        assert_eq!(m.get(1, 0).unwrap(), 1);
        assert_eq!(m.nodata(), Some(255));
    }
}
