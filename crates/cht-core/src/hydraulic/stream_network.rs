//! Channel network from channel heads, Strahler ordering, and ridge /
//! hilltop extraction between same-order basins.
use super::flow_routing::FlowInfo;
use crate::error::Result;
use crate::raster::Raster;
use crate::terrain::D8_OFFSETS;

/// Channel cells traced downstream from a set of sources.
pub struct JunctionNetwork {
    /// Strahler order per cell; 0 off the network.
    order: Vec<u32>,
    /// Sources and confluences.
    junctions: Vec<usize>,
    max_order: u32,
}

impl JunctionNetwork {
    /// Trace every source to base level and order the resulting network.
    pub fn new(sources: &[usize], flow: &FlowInfo) -> Self {
        let n = flow.width() * flow.height();
        let mut channel = vec![false; n];
        for &src in sources {
            let mut node = src;
            while flow.is_valid(node) && !channel[node] {
                channel[node] = true;
                match flow.receiver(node) {
                    Some(next) if next != node => node = next,
                    _ => break,
                }
            }
        }

        // Donors are visited before receivers when walking the stack backwards.
        let mut order = vec![0u32; n];
        let mut junctions = Vec::new();
        for &node in flow.stack().iter().rev() {
            if !channel[node] {
                continue;
            }
            let mut top = 0u32;
            let mut n_top = 0usize;
            let mut n_channel_donors = 0usize;
            for &d in flow.donors(node) {
                if !channel[d] {
                    continue;
                }
                n_channel_donors += 1;
                match order[d].cmp(&top) {
                    std::cmp::Ordering::Greater => {
                        top = order[d];
                        n_top = 1;
                    }
                    std::cmp::Ordering::Equal => n_top += 1,
                    std::cmp::Ordering::Less => {}
                }
            }
            order[node] = match n_channel_donors {
                0 => 1,
                _ if n_top >= 2 => top + 1,
                _ => top,
            };
            if n_channel_donors != 1 {
                junctions.push(node);
            }
        }
        junctions.sort_unstable();
        let max_order = order.iter().copied().max().unwrap_or(0);

        Self { order, junctions, max_order }
    }

    pub fn max_order(&self) -> u32 {
        self.max_order
    }

    pub fn junction_count(&self) -> usize {
        self.junctions.len()
    }

    #[inline]
    pub fn is_channel(&self, idx: usize) -> bool {
        self.order[idx] > 0
    }

    /// Strahler order of a channel cell, None off the network.
    #[inline]
    pub fn order_of(&self, idx: usize) -> Option<u32> {
        (self.order[idx] > 0).then_some(self.order[idx])
    }

    /// Ridge cells between adjacent basins of equal stream order.
    ///
    /// For each order k, a basin is everything draining to the last cell of
    /// an order-k link (the cell whose receiver has higher order or is
    /// itself). A hillslope cell bordering a different order-k basin is a
    /// ridge cell with value k; higher orders overwrite lower ones.
    pub fn extract_ridges(&self, flow: &FlowInfo) -> Raster {
        let mut ridges = flow.template().clone();
        let (w, h) = (flow.width(), flow.height());
        let n = w * h;
        let mut label: Vec<Option<usize>> = vec![None; n];

        for k in 1..=self.max_order {
            label.iter_mut().for_each(|l| *l = None);
            for &node in flow.stack() {
                let Some(rcv) = flow.receiver(node) else { continue };
                let is_outlet = self.order_of(node) == Some(k)
                    && (rcv == node || self.order_of(rcv).is_some_and(|o| o > k));
                label[node] = if is_outlet {
                    Some(node)
                } else if rcv != node {
                    label[rcv]
                } else {
                    None
                };
            }

            for idx in 0..n {
                let Some(own) = label[idx] else { continue };
                if self.is_channel(idx) {
                    continue;
                }
                let (r, c) = (idx / w, idx % w);
                let borders_other = D8_OFFSETS.iter().any(|&(dr, dc)| {
                    let (nr, nc) = (r as isize + dr, c as isize + dc);
                    if nr < 0 || nc < 0 || nr as usize >= h || nc as usize >= w {
                        return false;
                    }
                    matches!(label[nr as usize * w + nc as usize], Some(other) if other != own)
                });
                if borders_other {
                    ridges.data[idx] = k as f32;
                }
            }
        }
        ridges
    }

    /// Ridge cells off the channel network whose slope is below `threshold`.
    pub fn extract_hilltops(&self, ridges: &Raster, slope: &Raster, threshold: f32) -> Result<Raster> {
        ridges.check_same_grid(slope)?;
        let mut hilltops = ridges.empty_like();
        for (idx, out) in hilltops.data.iter_mut().enumerate() {
            let (rv, sv) = (ridges.data[idx], slope.data[idx]);
            if !ridges.is_nodata(rv) && !slope.is_nodata(sv) && sv < threshold && !self.is_channel(idx) {
                *out = rv;
            }
        }
        Ok(hilltops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydraulic::BoundaryCondition;

    /// Two south-draining valleys at columns 5 and 15 split by a divide at
    /// column 10.
    fn twin_valleys() -> Raster {
        let (w, h) = (21, 20);
        let mut dem = Raster::flat(w, h, 0.0);
        for r in 0..h {
            for c in 0..w {
                let lateral = (c as i32 - 5).abs().min((c as i32 - 15).abs()) as f32;
                dem.set(r, c, 10.0 * lateral + (h - 1 - r) as f32);
            }
        }
        dem
    }

    fn network(dem: &Raster, sources: &[usize]) -> (FlowInfo, JunctionNetwork) {
        let flow = FlowInfo::new(&[BoundaryCondition::NoFlux; 4], dem);
        let net = JunctionNetwork::new(sources, &flow);
        (flow, net)
    }

    #[test]
    fn confluence_raises_strahler_order() {
        // A "Y": two first-order heads joining in a south-flowing trunk.
        let (w, h) = (9, 12);
        let mut dem = Raster::flat(w, h, 0.0);
        for r in 0..h {
            for c in 0..w {
                let lateral = (c as i32 - 4).abs() as f32;
                dem.set(r, c, 5.0 * lateral + (h - 1 - r) as f32 * 2.0);
            }
        }
        let flow = FlowInfo::new(&[BoundaryCondition::NoFlux; 4], &dem);
        // Heads on either valley wall drain laterally into column 4.
        let left = dem.index(3, 1);
        let right = dem.index(3, 7);
        let net = JunctionNetwork::new(&[left, right], &flow);
        assert_eq!(net.order_of(left), Some(1));
        assert_eq!(net.order_of(right), Some(1));
        let outlet = dem.index(h - 1, 4);
        assert_eq!(net.order_of(outlet), Some(2));
        assert_eq!(net.max_order(), 2);
        assert_eq!(net.junction_count(), 3);
    }

    #[test]
    fn ridges_follow_the_divide() {
        let dem = twin_valleys();
        let sources = [dem.index(2, 5), dem.index(2, 15)];
        let (flow, net) = network(&dem, &sources);
        assert_eq!(net.max_order(), 1);

        let ridges = net.extract_ridges(&flow);
        let mut ridge_cols = Vec::new();
        for idx in 0..ridges.len() {
            if !ridges.is_nodata(ridges.data[idx]) {
                assert_eq!(ridges.data[idx], 1.0);
                assert!(!net.is_channel(idx));
                ridge_cols.push(idx % dem.width);
            }
        }
        assert!(!ridge_cols.is_empty());
        assert!(ridge_cols.iter().all(|&c| (9..=11).contains(&c)), "{ridge_cols:?}");
    }

    #[test]
    fn hilltops_keep_gentle_ridge_cells() {
        let dem = twin_valleys();
        let sources = [dem.index(2, 5), dem.index(2, 15)];
        let (flow, net) = network(&dem, &sources);
        let ridges = net.extract_ridges(&flow);

        let gentle = dem.like(0.1);
        let hilltops = net.extract_hilltops(&ridges, &gentle, 0.4).unwrap();
        assert_eq!(hilltops.valid_count(), ridges.valid_count());

        let steep = dem.like(0.9);
        let none = net.extract_hilltops(&ridges, &steep, 0.4).unwrap();
        assert_eq!(none.valid_count(), 0);
    }

    #[test]
    fn no_sources_means_no_ridges() {
        let dem = twin_valleys();
        let (flow, net) = network(&dem, &[]);
        assert_eq!(net.max_order(), 0);
        assert_eq!(net.extract_ridges(&flow).valid_count(), 0);
    }
}
