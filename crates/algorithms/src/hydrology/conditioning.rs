//! DEM conditioning: pits, depressions, flats
//!
//! `condition_dem` chains the three passes so every valid cell either has a
//! strictly lower neighbour or is a terminal sink.

use super::flats::{resolve_flats, ResolveFlatsParams};
use super::priority_flood::fill_depressions;
use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::{Algorithm, Error, Result};
use tracing::debug;

/// Parameters for the full conditioning chain
#[derive(Debug, Clone, Default)]
pub struct ConditionParams {
    pub flats: ResolveFlatsParams,
}

/// Hydrological conditioning stage
#[derive(Debug, Clone, Default)]
pub struct ConditionDem;

impl Algorithm for ConditionDem {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ConditionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Condition DEM"
    }

    fn description(&self) -> &'static str {
        "Fill pits and depressions, then resolve flats"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        condition_dem(&input, params)
    }
}

/// Raise single-cell pits to their lowest neighbour.
///
/// A pit is an interior cell whose eight neighbours are all valid and
/// strictly higher. Border cells and cells next to nodata are left alone.
pub fn fill_pits(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let data = dem.data();
    let mut output = data.clone();
    let mut count = 0usize;

    for row in 1..rows.saturating_sub(1) {
        for col in 1..cols.saturating_sub(1) {
            if !dem.is_valid(row, col) {
                continue;
            }
            let z = data[(row, col)];
            let mut lowest = f64::INFINITY;
            let mut is_pit = true;
            for (_, nr, nc) in d8::neighbors(row, col, rows, cols) {
                let zn = data[(nr, nc)];
                if !dem.is_valid(nr, nc) || zn <= z {
                    is_pit = false;
                    break;
                }
                lowest = lowest.min(zn);
            }
            if is_pit {
                output[(row, col)] = lowest;
                count += 1;
            }
        }
    }

    debug!("filled {} single-cell pit(s)", count);
    dem.derive(output, dem.nodata())
}

/// Condition a raw DEM for D8 routing: pits, then depressions, then flats.
///
/// Returns a new raster; the input is not modified.
pub fn condition_dem(dem: &Raster<f64>, params: ConditionParams) -> Result<Raster<f64>> {
    let pit_filled = fill_pits(dem)?;
    let flooded = fill_depressions(&pit_filled)?;
    resolve_flats(&flooded, dem, params.flats)
}
