//! Stream network extraction and Strahler ordering
//!
//! Works on a drainage mask (`1` = network cell) together with the D8 flow
//! directions. Only flow between two drainage cells counts as network flow.

use super::flow_accumulation::ensure_same_shape;
use geo::{Coord, LineString};
use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::Result;
use ndarray::Array2;
use std::collections::VecDeque;
use tracing::debug;

/// A polyline reach of the stream network
#[derive(Debug, Clone, PartialEq)]
pub struct StreamReach {
    pub geometry: LineString<f64>,
    /// Strahler order at the first vertex; `None` when unknown
    pub order: Option<u32>,
}

/// Number of drainage neighbours that flow into each drainage cell
fn network_inflows(flow_dir: &Raster<u8>, mask: &Raster<u8>) -> Array2<u8> {
    let (rows, cols) = flow_dir.shape();
    let mut inflow = Array2::<u8>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            if mask.data()[(row, col)] != 1 {
                continue;
            }
            let dir = unsafe { flow_dir.get_unchecked(row, col) };
            if let Some((nr, nc)) = d8::downstream(dir, row, col, rows, cols) {
                if mask.data()[(nr, nc)] == 1 {
                    inflow[(nr, nc)] += 1;
                }
            }
        }
    }
    inflow
}

/// Strahler order of every drainage cell.
///
/// Heads get order 1. Downstream, a cell takes the largest order among its
/// network parents, plus one when at least two parents share that maximum.
/// Cells off the network are NaN.
pub fn stream_order(flow_dir: &Raster<u8>, mask: &Raster<u8>) -> Result<Raster<f64>> {
    ensure_same_shape(flow_dir, mask)?;
    let (rows, cols) = flow_dir.shape();

    let mut pending = network_inflows(flow_dir, mask);
    let mut max_parent = Array2::<u32>::zeros((rows, cols));
    let mut max_count = Array2::<u8>::zeros((rows, cols));
    let mut order = Array2::<f64>::from_elem((rows, cols), f64::NAN);

    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    for ((row, col), &m) in mask.data().indexed_iter() {
        if m == 1 && pending[(row, col)] == 0 {
            queue.push_back((row, col));
        }
    }

    while let Some((row, col)) = queue.pop_front() {
        let own = match max_parent[(row, col)] {
            0 => 1,
            max if max_count[(row, col)] >= 2 => max + 1,
            max => max,
        };
        order[(row, col)] = own as f64;

        let dir = unsafe { flow_dir.get_unchecked(row, col) };
        let Some((nr, nc)) = d8::downstream(dir, row, col, rows, cols) else {
            continue;
        };
        if mask.data()[(nr, nc)] != 1 {
            continue;
        }

        if own > max_parent[(nr, nc)] {
            max_parent[(nr, nc)] = own;
            max_count[(nr, nc)] = 1;
        } else if own == max_parent[(nr, nc)] {
            max_count[(nr, nc)] += 1;
        }

        pending[(nr, nc)] -= 1;
        if pending[(nr, nc)] == 0 {
            queue.push_back((nr, nc));
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = order;
    Ok(output)
}

/// Vectorise the drainage mask into reaches.
///
/// A reach starts at a head (no network inflow) or at a confluence (two or
/// more inflows) and follows the flow direction through single-inflow cells.
/// The next confluence is appended as the last vertex so reaches join up.
/// Vertices are cell centres in map coordinates.
pub fn extract_network(flow_dir: &Raster<u8>, mask: &Raster<u8>) -> Result<Vec<LineString<f64>>> {
    ensure_same_shape(flow_dir, mask)?;
    let (rows, cols) = flow_dir.shape();
    let inflow = network_inflows(flow_dir, mask);
    let total = rows * cols;

    let vertex = |row: usize, col: usize| {
        let (x, y) = flow_dir.pixel_to_geo(col, row);
        Coord { x, y }
    };

    let mut lines = Vec::new();
    for ((row, col), &m) in mask.data().indexed_iter() {
        if m != 1 || inflow[(row, col)] == 1 {
            continue;
        }

        let mut coords = vec![vertex(row, col)];
        let (mut cur_row, mut cur_col) = (row, col);
        while coords.len() <= total {
            let dir = unsafe { flow_dir.get_unchecked(cur_row, cur_col) };
            let Some((nr, nc)) = d8::downstream(dir, cur_row, cur_col, rows, cols) else {
                break;
            };
            if mask.data()[(nr, nc)] != 1 {
                break;
            }
            coords.push(vertex(nr, nc));
            if inflow[(nr, nc)] >= 2 {
                break;
            }
            cur_row = nr;
            cur_col = nc;
        }

        if coords.len() >= 2 {
            lines.push(LineString::new(coords));
        }
    }

    debug!("extracted {} stream reaches", lines.len());
    Ok(lines)
}

/// Attach the Strahler order found under each reach's first vertex
pub fn assign_orders(lines: Vec<LineString<f64>>, order: &Raster<f64>) -> Vec<StreamReach> {
    lines
        .into_iter()
        .map(|geometry| {
            let order = geometry
                .0
                .first()
                .and_then(|c| order.cell_at(c.x, c.y))
                .and_then(|(row, col)| order.get(row, col).ok())
                .filter(|v| v.is_finite() && *v >= 1.0)
                .map(|v| v as u32);
            StreamReach { geometry, order }
        })
        .collect()
}
