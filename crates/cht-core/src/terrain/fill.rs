//! Priority-flood depression filling with a minimum-gradient constraint.
//!
//! Seeds are the grid edge and every cell touching no-data. Cells are
//! popped lowest-first; each unvisited neighbour is raised to at least
//! `popped + min_slope · step`, so every filled cell has a monotone
//! descending path to a seed.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::raster::Raster;

use super::{D8_OFFSETS, D8_STEP};

#[derive(Debug, Clone, Copy)]
struct Cell {
    z: f64,
    idx: usize,
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

// Reversed so the max-heap pops the lowest cell; index breaks ties so the
// fill is deterministic.
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .z
            .partial_cmp(&self.z)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Fill depressions in `dem`. `min_slope` is a gradient (m/m); 0 allows flats.
pub fn fill(dem: &Raster, min_slope: f32) -> Raster {
    let (w, h) = (dem.width, dem.height);
    let mut out = dem.clone();
    if w == 0 || h == 0 {
        return out;
    }
    let min_slope = min_slope.max(0.0) as f64;
    let mut z: Vec<f64> = dem.data.iter().map(|&v| v as f64).collect();
    let mut visited = vec![false; w * h];
    let mut heap = BinaryHeap::new();

    for r in 0..h {
        for c in 0..w {
            let idx = r * w + c;
            if !dem.is_valid_at(idx) {
                visited[idx] = true;
                continue;
            }
            let on_edge = r == 0 || c == 0 || r == h - 1 || c == w - 1;
            let by_nodata = D8_OFFSETS.iter().any(|&(dr, dc)| {
                let (nr, nc) = (r as isize + dr, c as isize + dc);
                nr >= 0
                    && nc >= 0
                    && (nr as usize) < h
                    && (nc as usize) < w
                    && !dem.is_valid_at(nr as usize * w + nc as usize)
            });
            if on_edge || by_nodata {
                visited[idx] = true;
                heap.push(Cell { z: z[idx], idx });
            }
        }
    }

    while let Some(Cell { z: zc, idx }) = heap.pop() {
        let (r, c) = (idx / w, idx % w);
        for (k, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
            let (nr, nc) = (r as isize + dr, c as isize + dc);
            if nr < 0 || nc < 0 || nr as usize >= h || nc as usize >= w {
                continue;
            }
            let n = nr as usize * w + nc as usize;
            if visited[n] {
                continue;
            }
            visited[n] = true;
            let floor = zc + min_slope * D8_STEP[k] * dem.cellsize;
            if z[n] < floor {
                z[n] = floor;
            }
            heap.push(Cell { z: z[n], idx: n });
        }
    }

    for (o, (&zi, &orig)) in out.data.iter_mut().zip(z.iter().zip(dem.data.iter())) {
        if !dem.is_nodata(orig) {
            *o = zi as f32;
        }
    }
    out
}
