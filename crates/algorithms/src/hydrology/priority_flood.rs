//! Priority-Flood depression filling
//!
//! Processes cells in elevation order with a min-heap, starting from the
//! grid border and from every cell next to nodata. Enclosed depressions are
//! raised to the elevation of their pour point, leaving flat surfaces that
//! [`resolve_flats`](super::resolve_flats) later tilts.
//!
//! Reference:
//! Barnes, R., Lehman, C., & Mulla, D. (2014). Priority-Flood: An optimal
//! depression-filling and watershed-labeling algorithm for digital elevation
//! models. *Computers & Geosciences*, 62, 117–127.

use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::{Algorithm, Error, Result};
use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// A cell in the priority queue, ordered by elevation (min-heap).
///
/// `seq` keeps pops deterministic among equal elevations.
#[derive(Debug, Clone)]
struct Cell {
    elevation: f64,
    seq: u64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse: lower elevation, then earlier insertion, has higher priority
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Depression filling stage
#[derive(Debug, Clone, Default)]
pub struct FillDepressions;

impl Algorithm for FillDepressions {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fill Depressions"
    }

    fn description(&self) -> &'static str {
        "Raise enclosed depressions to their pour point (Priority-Flood)"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        fill_depressions(&input)
    }
}

/// Whether a valid cell can drain out of the grid: it sits on the border or
/// touches a nodata cell.
pub(crate) fn is_edge_cell(dem: &Raster<f64>, row: usize, col: usize) -> bool {
    let (rows, cols) = dem.shape();
    if row == 0 || col == 0 || row + 1 == rows || col + 1 == cols {
        return true;
    }
    d8::neighbors(row, col, rows, cols).any(|(_, nr, nc)| !dem.is_valid(nr, nc))
}

/// Fill depressions in a DEM with Priority-Flood (epsilon = 0).
///
/// Filled regions become exactly flat at their spill elevation. Nodata
/// cells are copied through untouched and never filled.
pub fn fill_depressions(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();

    let mut output = dem.data().clone();
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    // Seed with border cells and cells adjacent to nodata
    for row in 0..rows {
        for col in 0..cols {
            if !dem.is_valid(row, col) {
                visited[(row, col)] = true;
                continue;
            }
            if is_edge_cell(dem, row, col) {
                let elevation = output[(row, col)];
                heap.push(Cell { elevation, seq, row, col });
                seq += 1;
                visited[(row, col)] = true;
            }
        }
    }

    let mut raised = 0usize;

    while let Some(cell) = heap.pop() {
        for (_, nr, nc) in d8::neighbors(cell.row, cell.col, rows, cols) {
            if visited[(nr, nc)] {
                continue;
            }
            visited[(nr, nc)] = true;

            let neighbor_elev = output[(nr, nc)];
            let filled_elev = if neighbor_elev < cell.elevation {
                raised += 1;
                cell.elevation
            } else {
                neighbor_elev
            };

            output[(nr, nc)] = filled_elev;
            heap.push(Cell {
                elevation: filled_elev,
                seq,
                row: nr,
                col: nc,
            });
            seq += 1;
        }
    }

    debug!("priority flood raised {} cells", raised);
    dem.derive(output, dem.nodata())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrorisk_core::GeoTransform;

    fn create_dem_with_sink() -> Raster<f64> {
        // 7x7 DEM with a depression in the center
        let values = vec![
            9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
            9.0, 8.0, 8.0, 8.0, 8.0, 8.0, 9.0,
            9.0, 8.0, 7.0, 7.0, 7.0, 8.0, 9.0,
            9.0, 8.0, 7.0, 3.0, 7.0, 8.0, 9.0,
            9.0, 8.0, 7.0, 7.0, 7.0, 8.0, 9.0,
            9.0, 8.0, 8.0, 8.0, 8.0, 8.0, 9.0,
            9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
        ];
        let mut dem = Raster::from_vec(values, 7, 7).unwrap();
        dem.set_transform(GeoTransform::new(0.0, 7.0, 1.0, -1.0));
        dem
    }

    #[test]
    fn test_bowl_fills_to_rim() {
        // The bowl spills over the border at 9, so everything inside rises to 9
        let filled = fill_depressions(&create_dem_with_sink()).unwrap();
        for row in 0..7 {
            for col in 0..7 {
                assert_eq!(filled.get(row, col).unwrap(), 9.0, "({}, {})", row, col);
            }
        }
    }

    #[test]
    fn test_no_change_on_clean_dem() {
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }

        let filled = fill_depressions(&dem).unwrap();
        assert_eq!(filled.data(), dem.data());
    }

    #[test]
    fn test_outlet_respects_low_border() {
        // Border at 10 except a low outlet at (4,2); center sink at 1
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        for row in 0..5 {
            for col in 0..5 {
                let is_border = row == 0 || row == 4 || col == 0 || col == 4;
                dem.set(row, col, if is_border { 10.0 } else { 5.0 }).unwrap();
            }
        }
        dem.set(2, 2, 1.0).unwrap();
        dem.set(4, 2, 2.0).unwrap();

        let filled = fill_depressions(&dem).unwrap();
        assert_eq!(filled.get(2, 2).unwrap(), 5.0);
        assert_eq!(filled.get(4, 2).unwrap(), 2.0);
    }

    #[test]
    fn test_nodata_neighbours_seed_the_flood() {
        // A hole of nodata in the middle acts as an outlet for the low cell beside it
        let mut dem = Raster::filled(5, 5, 10.0);
        dem.set_nodata(Some(-9999.0));
        dem.set(2, 2, -9999.0).unwrap();
        dem.set(2, 1, 4.0).unwrap();

        let filled = fill_depressions(&dem).unwrap();
        assert_eq!(filled.get(2, 1).unwrap(), 4.0);
        assert_eq!(filled.get(2, 2).unwrap(), -9999.0);
    }

    #[test]
    fn test_never_lowers_elevation() {
        let dem = create_dem_with_sink();
        let filled = fill_depressions(&dem).unwrap();
        for (orig, fill) in dem.data().iter().zip(filled.data().iter()) {
            assert!(fill >= orig);
        }
    }
}
