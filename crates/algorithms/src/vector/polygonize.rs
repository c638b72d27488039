//! Raster to polygon conversion
//!
//! Cells with equal values are grouped into 4-connected regions; each
//! region's outline is traced along cell edges into one exterior ring plus
//! one ring per hole. Diagonally touching cells belong to separate regions,
//! and where a hole touches the outline at a single corner the two rings are
//! kept apart.

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use hydrorisk_core::raster::{GeoTransform, Raster};
use hydrorisk_core::RasterElement;
use ndarray::Array2;
use std::collections::HashMap;
use tracing::debug;

/// A polygon covering one connected region of a single raster class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPolygon {
    pub class: f64,
    pub polygon: Polygon<f64>,
}

const EAST: u8 = 0;
const SOUTH: u8 = 1;
const WEST: u8 = 2;
const NORTH: u8 = 3;

/// Directed cell edge between lattice points `(x = col, y = row)`.
///
/// Edges run clockwise around their region on screen (row axis down).
#[derive(Debug, Clone, Copy)]
struct Edge {
    start: (usize, usize),
    dir: u8,
}

impl Edge {
    fn end(&self) -> (usize, usize) {
        let (x, y) = self.start;
        match self.dir {
            EAST => (x + 1, y),
            SOUTH => (x, y + 1),
            WEST => (x - 1, y),
            _ => (x, y - 1),
        }
    }
}

const UNLABELLED: usize = usize::MAX;

/// Label 4-connected regions of equal key; `None` cells stay unlabelled
fn label_regions<K, F>(rows: usize, cols: usize, key: F) -> (Array2<usize>, Vec<K>)
where
    K: PartialEq + Copy,
    F: Fn(usize, usize) -> Option<K>,
{
    let mut labels = Array2::from_elem((rows, cols), UNLABELLED);
    let mut keys = Vec::new();
    let mut stack = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if labels[(row, col)] != UNLABELLED {
                continue;
            }
            let Some(k) = key(row, col) else {
                continue;
            };

            let id = keys.len();
            keys.push(k);
            labels[(row, col)] = id;
            stack.push((row, col));

            while let Some((r, c)) = stack.pop() {
                let mut visit = |nr: usize, nc: usize| {
                    if labels[(nr, nc)] == UNLABELLED && key(nr, nc) == Some(k) {
                        labels[(nr, nc)] = id;
                        stack.push((nr, nc));
                    }
                };
                if r > 0 {
                    visit(r - 1, c);
                }
                if r + 1 < rows {
                    visit(r + 1, c);
                }
                if c > 0 {
                    visit(r, c - 1);
                }
                if c + 1 < cols {
                    visit(r, c + 1);
                }
            }
        }
    }

    (labels, keys)
}

/// Boundary edges of every labelled region, indexed by region id
fn region_edges(labels: &Array2<usize>, count: usize) -> Vec<Vec<Edge>> {
    let (rows, cols) = labels.dim();
    let mut edges = vec![Vec::new(); count];
    let label_at = |r: isize, c: isize| -> usize {
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            UNLABELLED
        } else {
            labels[(r as usize, c as usize)]
        }
    };

    for ((row, col), &id) in labels.indexed_iter() {
        if id == UNLABELLED {
            continue;
        }
        let (r, c) = (row as isize, col as isize);
        let out = &mut edges[id];
        if label_at(r - 1, c) != id {
            out.push(Edge { start: (col, row), dir: EAST });
        }
        if label_at(r, c + 1) != id {
            out.push(Edge { start: (col + 1, row), dir: SOUTH });
        }
        if label_at(r + 1, c) != id {
            out.push(Edge { start: (col + 1, row + 1), dir: WEST });
        }
        if label_at(r, c - 1) != id {
            out.push(Edge { start: (col, row + 1), dir: NORTH });
        }
    }
    edges
}

/// Chain a region's edges into closed rings of lattice points.
///
/// At a corner shared by two diagonal cells the walk turns left first, so
/// each ring follows the outline of a single neighbouring area.
fn trace_rings(edges: &[Edge]) -> Vec<Vec<(usize, usize)>> {
    let mut by_start: HashMap<(usize, usize), Vec<usize>> = HashMap::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        by_start.entry(e.start).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }

        let mut ring_edges = Vec::new();
        let mut current = first;
        loop {
            used[current] = true;
            ring_edges.push(current);

            let dir = edges[current].dir;
            let candidates = by_start.get(&edges[current].end()).map(Vec::as_slice).unwrap_or(&[]);
            let next = [(dir + 3) % 4, dir, (dir + 1) % 4]
                .iter()
                .find_map(|&want| candidates.iter().copied().find(|&i| edges[i].dir == want));

            match next {
                Some(n) if n == first => break,
                Some(n) if !used[n] => current = n,
                _ => {
                    debug!("unclosed boundary ring with {} edges", ring_edges.len());
                    break;
                }
            }
        }

        // Keep only corners
        let n = ring_edges.len();
        let mut ring: Vec<(usize, usize)> = (0..n)
            .filter(|&i| edges[ring_edges[i]].dir != edges[ring_edges[(i + n - 1) % n]].dir)
            .map(|i| edges[ring_edges[i]].start)
            .collect();
        if ring.len() >= 3 {
            ring.push(ring[0]);
            rings.push(ring);
        }
    }

    rings
}

/// Twice the signed shoelace area of a closed lattice ring
fn lattice_area2(ring: &[(usize, usize)]) -> i64 {
    ring.windows(2)
        .map(|w| w[0].0 as i64 * w[1].1 as i64 - w[1].0 as i64 * w[0].1 as i64)
        .sum()
}

fn to_map_ring(ring: &[(usize, usize)], transform: &GeoTransform) -> LineString<f64> {
    ring.iter()
        .map(|&(x, y)| {
            let (mx, my) = transform.pixel_to_geo_corner(x, y);
            Coord { x: mx, y: my }
        })
        .collect()
}

/// Assemble one polygon per region: the widest ring is the exterior
fn region_polygons(labels: &Array2<usize>, count: usize, transform: &GeoTransform) -> Vec<Polygon<f64>> {
    region_edges(labels, count)
        .iter()
        .map(|edges| {
            let mut rings = trace_rings(edges);
            let Some(outer) = rings
                .iter()
                .enumerate()
                .max_by_key(|(_, r)| lattice_area2(r).abs())
                .map(|(i, _)| i)
            else {
                return Polygon::new(LineString::new(vec![]), vec![]);
            };
            let exterior = rings.swap_remove(outer);
            let holes = rings.iter().map(|r| to_map_ring(r, transform)).collect();
            Polygon::new(to_map_ring(&exterior, transform), holes)
        })
        .collect()
}

/// Polygonize the cells equal to `1` in a binary mask into one multipolygon
pub fn polygonize_mask(mask: &Raster<u8>) -> MultiPolygon<f64> {
    let (rows, cols) = mask.shape();
    let (labels, keys) = label_regions(rows, cols, |r, c| (mask.data()[(r, c)] == 1).then_some(()));
    let polygons = region_polygons(&labels, keys.len(), mask.transform());
    debug!("polygonized mask into {} parts", polygons.len());
    MultiPolygon::new(polygons)
}

/// Polygonize every class of a categorical raster.
///
/// Nodata cells and cells equal to `skip_class` produce no polygons.
/// Regions are returned in row-major order of their first cell.
pub fn polygonize_classes<T: RasterElement>(raster: &Raster<T>, skip_class: Option<f64>) -> Vec<ClassPolygon> {
    let (rows, cols) = raster.shape();
    let (labels, keys) = label_regions(rows, cols, |r, c| {
        let v = raster.data()[(r, c)];
        if raster.is_nodata(v) {
            return None;
        }
        let v = v.to_f64()?;
        (skip_class != Some(v)).then_some(v)
    });

    let polygons = region_polygons(&labels, keys.len(), raster.transform());
    debug!("polygonized {} class regions", polygons.len());
    keys.into_iter()
        .zip(polygons)
        .map(|(class, polygon)| ClassPolygon { class, polygon })
        .collect()
}

/// Burn polygons onto the grid of `template`: `1` where the cell centre is inside
pub fn rasterize_mask<T: RasterElement>(polygons: &MultiPolygon<f64>, template: &Raster<T>) -> Raster<u8> {
    let (rows, cols) = template.shape();
    let mut out = template.with_same_meta::<u8>(rows, cols);
    for ((row, col), cell) in out.data_mut().indexed_iter_mut() {
        let (x, y) = template.pixel_to_geo(col, row);
        *cell = u8::from(polygons.contains(&Point::new(x, y)));
    }
    out
}
