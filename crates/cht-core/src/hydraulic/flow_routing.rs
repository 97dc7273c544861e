//! D8 flow routing, donor stack and contributing area.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::raster::Raster;
use crate::terrain::{D8_OFFSETS, D8_STEP};

/// What happens to flow reaching one edge of the grid.
///
/// Settings files spell conditions the way [`FromStr`] reads them
/// (`"No Flux"`, `"b"`, ...) and write them back in [`Display`] form.
///
/// [`Display`]: fmt::Display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BoundaryCondition {
    /// Flow may not leave through this edge; edge cells drain inward when
    /// they can and are base level otherwise.
    NoFlux,
    /// Every cell on this edge is a base-level outlet.
    BaseLevel,
}

impl FromStr for BoundaryCondition {
    type Err = TerrainError;

    /// Parsed by first letter: `n`/"No Flux", `b`/"Base Level".
    /// Periodic boundaries (`p`) are not supported.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('n') => Ok(BoundaryCondition::NoFlux),
            Some('b') => Ok(BoundaryCondition::BaseLevel),
            _ => Err(TerrainError::UnsupportedBoundary(s.to_string())),
        }
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoundaryCondition::NoFlux => "No Flux",
            BoundaryCondition::BaseLevel => "Base Level",
        })
    }
}

impl TryFrom<String> for BoundaryCondition {
    type Error = TerrainError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<BoundaryCondition> for String {
    fn from(bc: BoundaryCondition) -> String {
        bc.to_string()
    }
}

/// Steepest-descent routing over a filled DEM.
pub struct FlowInfo {
    /// No-data raster on the DEM's grid; fixes georeferencing of outputs.
    template: Raster,
    /// Receiver of each cell; `Some(i)` at cell `i` marks base level,
    /// None marks no-data.
    receiver: Vec<Option<usize>>,
    /// Donors of cell `i` are `donor_list[donor_start[i]..donor_start[i + 1]]`.
    donor_start: Vec<usize>,
    donor_list: Vec<usize>,
    /// Every valid cell, each receiver before all of its donors.
    stack: Vec<usize>,
    /// Upstream cell count, self included.
    contributing: Vec<u32>,
}

impl FlowInfo {
    /// Route flow over `filled` with edge conditions in N, E, S, W order.
    pub fn new(boundary: &[BoundaryCondition; 4], filled: &Raster) -> Self {
        let (w, h) = (filled.width, filled.height);
        let n = w * h;
        let [north, east, south, west] = *boundary;
        let cs = filled.cellsize;

        // ── Receivers ─────────────────────────────────────────────────────
        let mut receiver = vec![None; n];
        for r in 0..h {
            for c in 0..w {
                let idx = r * w + c;
                if !filled.is_valid_at(idx) {
                    continue;
                }
                let outlet_edge = (r == 0 && north == BoundaryCondition::BaseLevel)
                    || (c + 1 == w && east == BoundaryCondition::BaseLevel)
                    || (r + 1 == h && south == BoundaryCondition::BaseLevel)
                    || (c == 0 && west == BoundaryCondition::BaseLevel);
                if outlet_edge {
                    receiver[idx] = Some(idx);
                    continue;
                }
                let z = filled.data[idx] as f64;
                let mut best = idx;
                let mut best_drop = 0.0f64;
                for (k, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
                    let (nr, nc) = (r as isize + dr, c as isize + dc);
                    if nr < 0 || nc < 0 || nr as usize >= h || nc as usize >= w {
                        continue;
                    }
                    let nidx = nr as usize * w + nc as usize;
                    if !filled.is_valid_at(nidx) {
                        continue;
                    }
                    let drop = (z - filled.data[nidx] as f64) / (D8_STEP[k] * cs);
                    if drop > best_drop {
                        best_drop = drop;
                        best = nidx;
                    }
                }
                receiver[idx] = Some(best);
            }
        }

        // ── Donors (compressed rows) ──────────────────────────────────────
        let mut donor_count = vec![0usize; n];
        for (i, rec) in receiver.iter().enumerate() {
            if let Some(rcv) = *rec {
                if rcv != i {
                    donor_count[rcv] += 1;
                }
            }
        }
        let mut donor_start = vec![0usize; n + 1];
        for i in 0..n {
            donor_start[i + 1] = donor_start[i] + donor_count[i];
        }
        let mut fill_at = donor_start.clone();
        let mut donor_list = vec![0usize; donor_start[n]];
        for (i, rec) in receiver.iter().enumerate() {
            if let Some(rcv) = *rec {
                if rcv != i {
                    donor_list[fill_at[rcv]] = i;
                    fill_at[rcv] += 1;
                }
            }
        }

        // ── Stack: depth-first upstream from each base-level node ─────────
        let mut stack = Vec::with_capacity(n);
        let mut pending = Vec::new();
        for (i, rec) in receiver.iter().enumerate() {
            if *rec != Some(i) {
                continue;
            }
            pending.push(i);
            while let Some(node) = pending.pop() {
                stack.push(node);
                pending.extend_from_slice(&donor_list[donor_start[node]..donor_start[node + 1]]);
            }
        }

        // ── Contributing pixels ───────────────────────────────────────────
        let mut contributing: Vec<u32> =
            receiver.iter().map(|r| if r.is_some() { 1 } else { 0 }).collect();
        for &node in stack.iter().rev() {
            if let Some(rcv) = receiver[node] {
                if rcv != node {
                    contributing[rcv] += contributing[node];
                }
            }
        }

        Self {
            template: filled.empty_like(),
            receiver,
            donor_start,
            donor_list,
            stack,
            contributing,
        }
    }

    /// No-data raster on the routed grid.
    pub fn template(&self) -> &Raster {
        &self.template
    }

    pub fn width(&self) -> usize {
        self.template.width
    }

    pub fn height(&self) -> usize {
        self.template.height
    }

    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        self.receiver[idx].is_some()
    }

    #[inline]
    pub fn receiver(&self, idx: usize) -> Option<usize> {
        self.receiver[idx]
    }

    #[inline]
    pub fn is_base_level(&self, idx: usize) -> bool {
        self.receiver[idx] == Some(idx)
    }

    #[inline]
    pub fn donors(&self, idx: usize) -> &[usize] {
        &self.donor_list[self.donor_start[idx]..self.donor_start[idx + 1]]
    }

    /// Valid cells ordered so that each receiver precedes its donors.
    pub fn stack(&self) -> &[usize] {
        &self.stack
    }

    /// Upstream cell counts (self included), row-major; 0 on no-data.
    pub fn contributing_pixels(&self) -> &[u32] {
        &self.contributing
    }

    /// Valid cell containing map point `(x, y)`.
    pub fn node_at(&self, x: f64, y: f64) -> Option<usize> {
        let (r, c) = self.template.row_col_of(x, y)?;
        let idx = self.template.index(r, c);
        self.is_valid(idx).then_some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::DEFAULT_NODATA;

    const NO_FLUX: [BoundaryCondition; 4] = [BoundaryCondition::NoFlux; 4];

    /// Tilted plane falling towards the south edge.
    fn south_ramp(w: usize, h: usize) -> Raster {
        let mut r = Raster::flat(w, h, 0.0);
        for row in 0..h {
            for col in 0..w {
                r.set(row, col, (h - row) as f32 * 2.0);
            }
        }
        r
    }

    #[test]
    fn boundary_strings_parse_by_first_letter() {
        assert_eq!("No Flux".parse::<BoundaryCondition>().unwrap(), BoundaryCondition::NoFlux);
        assert_eq!("base level".parse::<BoundaryCondition>().unwrap(), BoundaryCondition::BaseLevel);
        assert!(matches!(
            "Periodic".parse::<BoundaryCondition>(),
            Err(TerrainError::UnsupportedBoundary(_))
        ));
    }

    #[test]
    fn ramp_flows_south_and_accumulates_by_column() {
        let (w, h) = (5, 6);
        let flow = FlowInfo::new(&NO_FLUX, &south_ramp(w, h));
        for row in 0..h - 1 {
            let idx = row * w + 2;
            assert_eq!(flow.receiver(idx), Some(idx + w));
        }
        let outlet = (h - 1) * w + 2;
        assert!(flow.is_base_level(outlet));
        assert_eq!(flow.contributing_pixels()[outlet], h as u32);
    }

    #[test]
    fn stack_places_receivers_before_donors() {
        let flow = FlowInfo::new(&NO_FLUX, &south_ramp(7, 7));
        let mut pos = vec![usize::MAX; 49];
        for (p, &node) in flow.stack().iter().enumerate() {
            pos[node] = p;
        }
        assert_eq!(flow.stack().len(), 49);
        for i in 0..49 {
            let rcv = flow.receiver(i).unwrap();
            assert!(pos[rcv] <= pos[i]);
        }
    }

    #[test]
    fn base_level_edge_captures_its_cells() {
        let dem = south_ramp(4, 4);
        let bc = [
            BoundaryCondition::BaseLevel,
            BoundaryCondition::NoFlux,
            BoundaryCondition::NoFlux,
            BoundaryCondition::NoFlux,
        ];
        let flow = FlowInfo::new(&bc, &dem);
        // Northern (highest) row is forced to base level.
        for c in 0..4 {
            assert!(flow.is_base_level(c));
            assert!(flow.donors(c).is_empty());
        }
    }

    #[test]
    fn nodata_cells_are_not_routed() {
        let mut dem = south_ramp(4, 4);
        dem.set(1, 1, DEFAULT_NODATA);
        let flow = FlowInfo::new(&NO_FLUX, &dem);
        assert!(!flow.is_valid(5));
        assert_eq!(flow.contributing_pixels()[5], 0);
        assert_eq!(flow.stack().len(), 15);
        // (0, 1) can no longer drain south through the hole.
        assert_ne!(flow.receiver(1), Some(5));
    }

    #[test]
    fn node_lookup_uses_map_coordinates() {
        let mut dem = south_ramp(3, 3);
        dem.xllcorner = 1000.0;
        dem.yllcorner = 2000.0;
        dem.cellsize = 10.0;
        let flow = FlowInfo::new(&NO_FLUX, &dem);
        assert_eq!(flow.node_at(1015.0, 2025.0), Some(1));
        assert_eq!(flow.node_at(999.0, 2025.0), None);
    }
}
