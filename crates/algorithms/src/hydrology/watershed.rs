//! Outlet snapping and catchment delineation
//!
//! - `threshold`: drainage mask from flow accumulation
//! - `snap`: move a requested outlet onto the nearest drainage cell
//! - `delineate`: every cell draining through the outlet
//! - `CatchmentWindow` / `clip_to_catchment`: crop products to the catchment

use super::flow_accumulation::ensure_same_shape;
use hydrorisk_core::raster::{d8, Raster, Window};
use hydrorisk_core::{Algorithm, Error, RasterElement, Result};
use ndarray::Array2;
use std::collections::VecDeque;
use tracing::debug;

/// Cells whose flow accumulation exceeds a threshold (`1` = drainage)
#[derive(Debug, Clone)]
pub struct DrainageMask {
    pub cells: Raster<u8>,
    pub threshold: f64,
}

impl DrainageMask {
    /// Number of drainage cells
    pub fn count(&self) -> usize {
        self.cells.data().iter().filter(|&&v| v == 1).count()
    }

    pub fn is_drainage(&self, row: usize, col: usize) -> bool {
        self.cells.get(row, col).is_ok_and(|v| v == 1)
    }
}

/// Elementwise `accumulation > t`. Nodata accumulation is never drainage.
pub fn threshold(accumulation: &Raster<f64>, t: f64) -> DrainageMask {
    let mut cells = accumulation.map(0u8, |acc| u8::from(acc > t));
    cells.set_nodata(None);
    DrainageMask { cells, threshold: t }
}

/// An outlet snapped onto the drainage network
#[derive(Debug, Clone, PartialEq)]
pub struct Outlet {
    pub row: usize,
    pub col: usize,
    /// Map coordinates of the cell centre
    pub x: f64,
    pub y: f64,
    /// Flow accumulation at the outlet cell
    pub accumulation: f64,
    /// Distance moved from the requested point
    pub distance: f64,
}

/// Parameters for outlet snapping
#[derive(Debug, Clone, Default)]
pub struct SnapParams {
    /// Reject snaps farther than this many map units; `None` searches the whole grid
    pub max_distance: Option<f64>,
}

/// Snap `(x, y)` to the nearest drainage cell centre (Euclidean, map units).
///
/// Ties go to the first cell in row-major order. Fails with
/// [`Error::SnapFailure`] when the mask has no drainage cell or the nearest
/// one lies beyond `max_distance`.
pub fn snap(
    x: f64,
    y: f64,
    mask: &DrainageMask,
    accumulation: &Raster<f64>,
    params: SnapParams,
) -> Result<Outlet> {
    ensure_same_shape(&mask.cells, accumulation)?;

    let mut best: Option<(f64, usize, usize)> = None;
    for ((row, col), &v) in mask.cells.data().indexed_iter() {
        if v != 1 {
            continue;
        }
        let (cx, cy) = mask.cells.pixel_to_geo(col, row);
        let d = (cx - x).hypot(cy - y);
        if best.map_or(true, |(bd, _, _)| d < bd) {
            best = Some((d, row, col));
        }
    }

    let failure = |nearest: Option<f64>| Error::SnapFailure {
        threshold: mask.threshold,
        x,
        y,
        nearest,
        max_distance: params.max_distance,
    };

    let (distance, row, col) = best.ok_or_else(|| failure(None))?;
    if params.max_distance.is_some_and(|max| distance > max) {
        return Err(failure(Some(distance)));
    }

    let (cx, cy) = mask.cells.pixel_to_geo(col, row);
    debug!("snapped ({}, {}) to cell ({}, {}) {:.2} units away", x, y, row, col, distance);

    Ok(Outlet {
        row,
        col,
        x: cx,
        y: cy,
        accumulation: accumulation.get(row, col)?,
        distance,
    })
}

/// Catchment delineation stage
#[derive(Debug, Clone, Default)]
pub struct Delineate;

impl Algorithm for Delineate {
    type Input = (Raster<u8>, Outlet);
    type Output = Raster<u8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Delineate"
    }

    fn description(&self) -> &'static str {
        "Collect every cell draining through an outlet"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        delineate(&input.1, &input.0)
    }
}

/// Catchment of `outlet`: breadth-first search upstream over the D8 graph.
///
/// Output is `1` inside the catchment, `0` elsewhere. The result always
/// contains the outlet and is 8-connected.
pub fn delineate(outlet: &Outlet, flow_dir: &Raster<u8>) -> Result<Raster<u8>> {
    let (rows, cols) = flow_dir.shape();
    if outlet.row >= rows || outlet.col >= cols {
        return Err(Error::IndexOutOfBounds {
            row: outlet.row,
            col: outlet.col,
            rows,
            cols,
        });
    }

    let mut catchment = Array2::<u8>::zeros((rows, cols));
    let mut queue = VecDeque::from([(outlet.row, outlet.col)]);
    catchment[(outlet.row, outlet.col)] = 1;

    while let Some((row, col)) = queue.pop_front() {
        for (code, nr, nc) in d8::neighbors(row, col, rows, cols) {
            if catchment[(nr, nc)] != 0 {
                continue;
            }
            // The neighbour drains here when it points back at us
            let neighbor_dir = unsafe { flow_dir.get_unchecked(nr, nc) };
            if neighbor_dir == d8::opposite(code) {
                catchment[(nr, nc)] = 1;
                queue.push_back((nr, nc));
            }
        }
    }

    let mut output = flow_dir.with_same_meta::<u8>(rows, cols);
    *output.data_mut() = catchment;
    Ok(output)
}

/// Bounding window of a catchment, shared by every clipped product
#[derive(Debug, Clone)]
pub struct CatchmentWindow {
    window: Window,
    mask: Raster<u8>,
}

impl CatchmentWindow {
    /// Window around the non-zero cells of `catchment`
    pub fn new(catchment: &Raster<u8>) -> Result<Self> {
        let window = Window::bounding(catchment)
            .ok_or_else(|| Error::EmptyResult("catchment has no cells".into()))?;
        Ok(Self {
            window,
            mask: catchment.window(window)?,
        })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Catchment mask restricted to the window
    pub fn mask(&self) -> &Raster<u8> {
        &self.mask
    }

    /// Crop `raster` to the window; cells outside the catchment become nodata.
    ///
    /// A raster without a nodata value gets its type's default.
    pub fn clip<T: RasterElement>(&self, raster: &Raster<T>) -> Result<Raster<T>> {
        let mut clipped = raster.window(self.window)?;
        let nodata = raster.nodata().unwrap_or_else(T::default_nodata);
        clipped.set_nodata(Some(nodata));
        for (value, &inside) in clipped.data_mut().iter_mut().zip(self.mask.data().iter()) {
            if inside == 0 {
                *value = nodata;
            }
        }
        Ok(clipped)
    }
}

/// Crop `raster` to the bounding box of `catchment`, masking outside cells
pub fn clip_to_catchment<T: RasterElement>(
    raster: &Raster<T>,
    catchment: &Raster<u8>,
) -> Result<Raster<T>> {
    ensure_same_shape(catchment, raster)?;
    CatchmentWindow::new(catchment)?.clip(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::{flow_accumulation, flow_direction};
    use approx::assert_relative_eq;
    use hydrorisk_core::GeoTransform;

    /// V-shaped valley draining south along column 3
    fn valley(rows: usize, cols: usize, cell: f64) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64 * cell, cell, -cell));
        for row in 0..rows {
            for col in 0..cols {
                let z = (col as f64 - 3.0).abs() * 10.0 + (rows - row) as f64;
                dem.set(row, col, z).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_threshold_is_strict() {
        let acc = Raster::from_vec(vec![1.0, 5.0, 6.0, f64::NAN], 2, 2).unwrap();
        let mask = threshold(&acc, 5.0);
        assert_eq!(mask.cells.data().as_slice().unwrap(), &[0, 0, 1, 0]);
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn test_snap_lands_on_drainage_cell() {
        let dem = valley(10, 7, 10.0);
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir, &dem).unwrap();
        let mask = threshold(&acc, 5.0);

        let outlet = snap(12.0, 8.0, &mask, &acc, SnapParams::default()).unwrap();
        assert!(mask.is_drainage(outlet.row, outlet.col));
        assert_eq!(outlet.col, 3);
        assert_eq!(outlet.row, 9);
        assert_relative_eq!(outlet.x, 35.0);
        assert_relative_eq!(outlet.y, 5.0);
        assert!(outlet.accumulation > 5.0);
    }

    #[test]
    fn test_snap_within_search_radius() {
        // One drainage cell with accumulation 1500, request 50 units away
        let mut acc: Raster<f64> = Raster::filled(30, 30, 1.0);
        acc.set_transform(GeoTransform::new(0.0, 300.0, 10.0, -10.0));
        acc.set(10, 10, 1500.0).unwrap();
        let mask = threshold(&acc, 1000.0);
        let (cx, cy) = acc.pixel_to_geo(10, 10);

        let outlet = snap(cx + 50.0, cy, &mask, &acc, SnapParams { max_distance: Some(100.0) }).unwrap();
        assert_eq!((outlet.row, outlet.col), (10, 10));
        assert_relative_eq!(outlet.distance, 50.0);
        assert_eq!(outlet.accumulation, 1500.0);

        let err = snap(cx + 50.0, cy, &mask, &acc, SnapParams { max_distance: Some(20.0) }).unwrap_err();
        match err {
            Error::SnapFailure { threshold, nearest, .. } => {
                assert_eq!(threshold, 1000.0);
                assert_relative_eq!(nearest.unwrap(), 50.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_snap_on_empty_mask_names_threshold() {
        let acc: Raster<f64> = Raster::filled(4, 4, 3.0);
        let mask = threshold(&acc, 1000.0);
        let err = snap(1.0, 1.0, &mask, &acc, SnapParams::default()).unwrap_err();
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_catchment_contains_outlet_and_upstream_only() {
        let dem = valley(10, 7, 1.0);
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir, &dem).unwrap();
        let mask = threshold(&acc, 5.0);
        let outlet = snap(3.5, 4.5, &mask, &acc, SnapParams::default()).unwrap();

        let catchment = delineate(&outlet, &fdir).unwrap();
        assert_eq!(catchment.get(outlet.row, outlet.col).unwrap(), 1);

        let inside = catchment.data().iter().filter(|&&v| v == 1).count();
        assert_eq!(inside as f64, acc.get(outlet.row, outlet.col).unwrap());

        // Nothing downstream of the outlet belongs to it
        for row in outlet.row + 1..10 {
            assert_eq!(catchment.get(row, 3).unwrap(), 0);
        }
    }

    #[test]
    fn test_clip_masks_outside_cells() {
        let mut catchment: Raster<u8> = Raster::new(5, 5);
        catchment.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        for &(r, c) in &[(1, 1), (2, 1), (2, 2), (3, 3)] {
            catchment.set(r, c, 1).unwrap();
        }
        let mut values: Raster<f64> = catchment.with_same_meta(5, 5);
        values.data_mut().fill(7.0);

        let clipped = clip_to_catchment(&values, &catchment).unwrap();
        assert_eq!(clipped.shape(), (3, 3));
        assert_eq!(clipped.get(0, 0).unwrap(), 7.0);
        assert!(clipped.get(0, 2).unwrap().is_nan());
        assert_eq!(clipped.get(2, 2).unwrap(), 7.0);
        assert_eq!(clipped.pixel_to_geo(0, 0), catchment.pixel_to_geo(1, 1));

        let fdir_like: Raster<u8> = catchment.like(4);
        let clipped = clip_to_catchment(&fdir_like, &catchment).unwrap();
        assert_eq!(clipped.get(0, 1).unwrap(), 0);
        assert_eq!(clipped.get(1, 1).unwrap(), 4);
    }

    #[test]
    fn test_empty_catchment_window() {
        let catchment: Raster<u8> = Raster::new(3, 3);
        assert!(matches!(
            CatchmentWindow::new(&catchment),
            Err(Error::EmptyResult(_))
        ));
    }
}
