//! D8 flow direction encoding
//!
//! Each cell drains into exactly one of its eight neighbours, encoded as a
//! power of two clockwise from east:
//!
//! ```text
//!   32  64  128
//!   16   0    1
//!    8   4    2
//! ```
//!
//! `0` marks a cell without outflow: a terminal sink, an outlet on the grid
//! edge, or a nodata cell.

/// No outflow
pub const NONE: u8 = 0;
pub const E: u8 = 1;
pub const SE: u8 = 2;
pub const S: u8 = 4;
pub const SW: u8 = 8;
pub const W: u8 = 16;
pub const NW: u8 = 32;
pub const N: u8 = 64;
pub const NE: u8 = 128;

/// Neighbours as `(code, row_offset, col_offset)` in tie-break priority order.
///
/// When two neighbours have the same steepest drop, the one listed first wins.
pub const NEIGHBORS: [(u8, isize, isize); 8] = [
    (N, -1, 0),
    (NE, -1, 1),
    (E, 0, 1),
    (SE, 1, 1),
    (S, 1, 0),
    (SW, 1, -1),
    (W, 0, -1),
    (NW, -1, -1),
];

/// Row/column offset for a direction code
pub fn offset(code: u8) -> Option<(isize, isize)> {
    NEIGHBORS
        .iter()
        .find(|&&(c, _, _)| c == code)
        .map(|&(_, dr, dc)| (dr, dc))
}

/// Code for a unit offset, if it is one of the eight neighbours
pub fn code_for(dr: isize, dc: isize) -> Option<u8> {
    NEIGHBORS
        .iter()
        .find(|&&(_, r, c)| r == dr && c == dc)
        .map(|&(code, _, _)| code)
}

/// The direction pointing back at the source cell
pub fn opposite(code: u8) -> u8 {
    code.rotate_left(4)
}

/// Whether the code is one of the eight valid directions
pub fn is_valid(code: u8) -> bool {
    code != NONE && code.is_power_of_two()
}

/// Map length of one step in the given direction
pub fn step_length(code: u8, cell_width: f64, cell_height: f64) -> f64 {
    match code {
        E | W => cell_width,
        N | S => cell_height,
        NONE => 0.0,
        _ => cell_width.hypot(cell_height),
    }
}

/// Downstream cell of `(row, col)` following `code`, if it stays on the grid
pub fn downstream(code: u8, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
    let (dr, dc) = offset(code)?;
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        return None;
    }
    Some((nr as usize, nc as usize))
}

/// In-grid neighbours of `(row, col)` with the direction that leads to them
pub fn neighbors(row: usize, col: usize, rows: usize, cols: usize) -> impl Iterator<Item = (u8, usize, usize)> {
    NEIGHBORS.iter().filter_map(move |&(code, dr, dc)| {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            None
        } else {
            Some((code, nr as usize, nc as usize))
        }
    })
}
