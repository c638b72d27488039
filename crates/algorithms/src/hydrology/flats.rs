//! Flat resolution
//!
//! Depression filling leaves perfectly flat areas where D8 has no downhill
//! neighbour. Each flat receives an infinitesimal gradient that combines
//! flow *towards* lower terrain with flow *away* from higher terrain, so
//! drainage converges on the flat's outlets instead of running parallel.
//!
//! A flat with no lower edge is a filled depression. When it is bounded by
//! higher ground and reaches the grid border or a nodata edge, those edge
//! cells are its pour points and the flat drains off the grid through them.
//! A flat with no higher ground around it either (the whole valid domain at
//! one level) drains towards its lowest cells in the raw, unfilled DEM,
//! which stay as its terminal sinks.
//!
//! Reference:
//! Barnes, R., Lehman, C., & Mulla, D. (2014). An efficient assignment of
//! drainage direction over flat surfaces in raster digital elevation models.
//! *Computers & Geosciences*, 62, 128–135.

use super::priority_flood::is_edge_cell;
use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::{Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;
use tracing::debug;

/// Parameters for flat resolution
#[derive(Debug, Clone)]
pub struct ResolveFlatsParams {
    /// Largest elevation increment per gradient step. The effective value
    /// is reduced per flat so no cell reaches the surrounding higher terrain.
    pub epsilon: f64,
}

impl Default for ResolveFlatsParams {
    fn default() -> Self {
        Self { epsilon: 1e-5 }
    }
}

/// One flat: its elevation and member cells
struct Flat {
    elevation: f64,
    cells: Vec<(usize, usize)>,
}

/// Give every flat in `filled` a drainable gradient.
///
/// `raw` is the DEM before filling; it only decides where flats without a
/// lower edge terminate. Cells outside flats are returned unchanged.
pub fn resolve_flats(
    filled: &Raster<f64>,
    raw: &Raster<f64>,
    params: ResolveFlatsParams,
) -> Result<Raster<f64>> {
    let (rows, cols) = filled.shape();
    let (rr, rc) = raw.shape();
    if (rows, cols) != (rr, rc) {
        return Err(Error::SizeMismatch { er: rows, ec: cols, ar: rr, ac: rc });
    }
    if !(params.epsilon > 0.0 && params.epsilon.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "epsilon",
            value: params.epsilon.to_string(),
            reason: "must be a positive finite increment".into(),
        });
    }

    let data = filled.data();

    // Cells with no strictly lower valid neighbour
    let mut no_outflow = Array2::<bool>::from_elem((rows, cols), false);
    for row in 0..rows {
        for col in 0..cols {
            if !filled.is_valid(row, col) {
                continue;
            }
            let z = data[(row, col)];
            no_outflow[(row, col)] = !d8::neighbors(row, col, rows, cols)
                .any(|(_, nr, nc)| filled.is_valid(nr, nc) && data[(nr, nc)] < z);
        }
    }

    let mut output = data.clone();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut next_label = 0u32;

    for row in 0..rows {
        for col in 0..cols {
            if !no_outflow[(row, col)] || labels[(row, col)] != 0 {
                continue;
            }
            next_label += 1;
            let flat = collect_flat(filled, &no_outflow, &mut labels, next_label, row, col);
            tilt_flat(filled, raw, &labels, next_label, &flat, &params, &mut output);
        }
    }

    debug!("resolved {} flat(s)", next_label);
    filled.derive(output, filled.nodata())
}

/// 8-connected region of equal-elevation cells without outflow
fn collect_flat(
    filled: &Raster<f64>,
    no_outflow: &Array2<bool>,
    labels: &mut Array2<u32>,
    label: u32,
    row: usize,
    col: usize,
) -> Flat {
    let (rows, cols) = filled.shape();
    let elevation = filled.data()[(row, col)];
    let mut cells = Vec::new();
    let mut queue = VecDeque::from([(row, col)]);
    labels[(row, col)] = label;

    while let Some((r, c)) = queue.pop_front() {
        cells.push((r, c));
        for (_, nr, nc) in d8::neighbors(r, c, rows, cols) {
            if labels[(nr, nc)] == 0
                && no_outflow[(nr, nc)]
                && filled.data()[(nr, nc)] == elevation
            {
                labels[(nr, nc)] = label;
                queue.push_back((nr, nc));
            }
        }
    }

    Flat { elevation, cells }
}

/// Breadth-first step counts inside one flat, starting from `seeds`
fn flat_distance(
    shape: (usize, usize),
    labels: &Array2<u32>,
    label: u32,
    seeds: &[(usize, usize)],
    start: u32,
) -> Array2<u32> {
    let (rows, cols) = shape;
    let mut dist = Array2::<u32>::from_elem(shape, u32::MAX);
    let mut queue = VecDeque::new();
    for &(r, c) in seeds {
        if dist[(r, c)] == u32::MAX {
            dist[(r, c)] = start;
            queue.push_back((r, c));
        }
    }
    while let Some((r, c)) = queue.pop_front() {
        let d = dist[(r, c)];
        for (_, nr, nc) in d8::neighbors(r, c, rows, cols) {
            if labels[(nr, nc)] == label && dist[(nr, nc)] == u32::MAX {
                dist[(nr, nc)] = d + 1;
                queue.push_back((nr, nc));
            }
        }
    }
    dist
}

fn tilt_flat(
    filled: &Raster<f64>,
    raw: &Raster<f64>,
    labels: &Array2<u32>,
    label: u32,
    flat: &Flat,
    params: &ResolveFlatsParams,
    output: &mut Array2<f64>,
) {
    let (rows, cols) = filled.shape();
    let data = filled.data();
    let z = flat.elevation;

    let mut low_adjacent = Vec::new();
    let mut high_edges = Vec::new();
    let mut gap = f64::INFINITY;

    for &(r, c) in &flat.cells {
        let mut touches_low = false;
        let mut touches_high = false;
        for (_, nr, nc) in d8::neighbors(r, c, rows, cols) {
            if !filled.is_valid(nr, nc) {
                continue;
            }
            let zn = data[(nr, nc)];
            if zn > z {
                touches_high = true;
                gap = gap.min(zn - z);
            } else if labels[(nr, nc)] != label {
                // Same elevation with an outflow of its own
                touches_low = true;
            }
        }
        if touches_low {
            low_adjacent.push((r, c));
        }
        if touches_high {
            high_edges.push((r, c));
        }
    }

    let spill: Vec<_> = if low_adjacent.is_empty() && !high_edges.is_empty() {
        flat.cells.iter().copied().filter(|&(r, c)| is_edge_cell(filled, r, c)).collect()
    } else {
        Vec::new()
    };

    let towards = if !low_adjacent.is_empty() {
        flat_distance((rows, cols), labels, label, &low_adjacent, 1)
    } else if !spill.is_empty() {
        flat_distance((rows, cols), labels, label, &spill, 0)
    } else {
        let sinks = terminal_cells(filled, raw, flat);
        flat_distance((rows, cols), labels, label, &sinks, 0)
    };

    let away = (!high_edges.is_empty())
        .then(|| flat_distance((rows, cols), labels, label, &high_edges, 1));
    let max_away = away
        .as_ref()
        .map(|a| flat.cells.iter().map(|&p| a[p]).max().unwrap_or(0))
        .unwrap_or(0);

    let mask: Vec<u64> = flat
        .cells
        .iter()
        .map(|&p| {
            let away_part = away.as_ref().map_or(0, |a| max_away.saturating_sub(a[p]));
            2 * towards[p] as u64 + away_part as u64
        })
        .collect();

    let max_mask = mask.iter().copied().max().unwrap_or(0);
    let epsilon = params.epsilon.min(gap / (max_mask as f64 + 1.0));

    for (&p, &m) in flat.cells.iter().zip(mask.iter()) {
        output[p] = z + epsilon * m as f64;
    }
}

/// Lowest raw cells of a flat without a lower edge, preferring cells that
/// sit on the grid border or next to nodata when several tie.
fn terminal_cells(filled: &Raster<f64>, raw: &Raster<f64>, flat: &Flat) -> Vec<(usize, usize)> {
    let raw_at = |(r, c): (usize, usize)| {
        if raw.is_valid(r, c) {
            raw.data()[(r, c)]
        } else {
            f64::INFINITY
        }
    };
    let lowest = flat
        .cells
        .iter()
        .map(|&p| raw_at(p))
        .fold(f64::INFINITY, f64::min);

    let candidates: Vec<_> = flat
        .cells
        .iter()
        .copied()
        .filter(|&p| raw_at(p) == lowest)
        .collect();
    let on_edge: Vec<_> = candidates
        .iter()
        .copied()
        .filter(|&(r, c)| is_edge_cell(filled, r, c))
        .collect();

    match (on_edge.is_empty(), candidates.is_empty()) {
        (false, _) => on_edge,
        (true, false) => candidates,
        // Raw grid is nodata over the whole flat; fall back to its first cell
        (true, true) => flat.cells[..1].to_vec(),
    }
}
