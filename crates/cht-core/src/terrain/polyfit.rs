//! Local quadratic surface fitting.
//!
//! At every cell a surface
//!
//! ```text
//! z = a·x² + b·y² + c·x·y + d·x + e·y + f
//! ```
//!
//! is fitted by least squares to the cells inside a circular window centred
//! on it (x east, y north, both in map units relative to the centre). The
//! window geometry is identical for every cell, so the pseudo-inverse of the
//! design matrix is computed once and each fit is a 6×K dot product.
//!
//! Derived metrics:
//!   slope      = √(d² + e²)                         (gradient, m/m)
//!   aspect     = azimuth of −(d, e), degrees from north, clockwise
//!   curvature  = 2a + 2b
//!   planform   = −2(a·e² + b·d² − c·d·e) / (d² + e²)^1.5
//!   profile    = −2(a·d² + b·e² + c·d·e) / ((d² + e²)(1 + d² + e²)^1.5)
//!
//! Cells whose window leaves the grid or touches no-data are no-data.
use crate::error::{Result, TerrainError};
use crate::raster::Raster;

/// Which rasters [`surface_metrics`] should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceSelection {
    pub elevation: bool,
    pub slope: bool,
    pub aspect: bool,
    pub curvature: bool,
    pub planform_curvature: bool,
    pub profile_curvature: bool,
}

impl SurfaceSelection {
    /// Slope and total curvature, the pair hilltop extraction needs.
    pub const SLOPE_AND_CURVATURE: Self = Self {
        elevation: false,
        slope: true,
        aspect: false,
        curvature: true,
        planform_curvature: false,
        profile_curvature: false,
    };
}

/// Rasters produced by [`surface_metrics`]; unrequested outputs are None.
#[derive(Debug, Clone, Default)]
pub struct SurfaceMetrics {
    pub elevation: Option<Raster>,
    pub slope: Option<Raster>,
    pub aspect: Option<Raster>,
    pub curvature: Option<Raster>,
    pub planform_curvature: Option<Raster>,
    pub profile_curvature: Option<Raster>,
}

/// Window offsets and the 6×K least-squares weights for one kernel radius.
struct Kernel {
    reach: usize,
    offsets: Vec<(isize, isize)>,
    /// `weights[j][k]`: contribution of window cell k to coefficient j
    /// (order a, b, c, d, e, f).
    weights: [Vec<f64>; 6],
}

impl Kernel {
    fn new(radius: f64, cellsize: f64) -> Option<Self> {
        let reach = (radius / cellsize * (1.0 + 1e-9)).floor() as usize;
        let r2 = radius * radius * (1.0 + 1e-9);
        let mut offsets = Vec::new();
        let mut rows: Vec<[f64; 6]> = Vec::new();
        let reach_i = reach as isize;
        for dr in -reach_i..=reach_i {
            for dc in -reach_i..=reach_i {
                let x = dc as f64 * cellsize;
                let y = -(dr as f64) * cellsize;
                if x * x + y * y <= r2 {
                    offsets.push((dr, dc));
                    rows.push([x * x, y * y, x * y, x, y, 1.0]);
                }
            }
        }

        let mut normal = [[0.0f64; 6]; 6];
        for row in &rows {
            for i in 0..6 {
                for j in 0..6 {
                    normal[i][j] += row[i] * row[j];
                }
            }
        }
        let inv = invert6(normal)?;

        let weights: [Vec<f64>; 6] = std::array::from_fn(|j| {
            rows.iter()
                .map(|row| (0..6).map(|i| inv[j][i] * row[i]).sum())
                .collect()
        });
        Some(Self { reach, offsets, weights })
    }
}

/// Gauss–Jordan inverse with partial pivoting. None if singular.
fn invert6(m: [[f64; 6]; 6]) -> Option<[[f64; 6]; 6]> {
    let mut a = m;
    let mut inv = [[0.0f64; 6]; 6];
    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    for col in 0..6 {
        let pivot = (col..6).max_by(|&p, &q| a[p][col].abs().total_cmp(&a[q][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);
        let p = a[col][col];
        for j in 0..6 {
            a[col][j] /= p;
            inv[col][j] /= p;
        }
        for r in 0..6 {
            if r != col {
                let factor = a[r][col];
                if factor != 0.0 {
                    for j in 0..6 {
                        a[r][j] -= factor * a[col][j];
                        inv[r][j] -= factor * inv[col][j];
                    }
                }
            }
        }
    }
    Some(inv)
}

/// Fit the quadratic surface at every cell of `dem` over a circular window of
/// `window_radius` map units (never smaller than √2 · cellsize) and return the
/// requested metrics.
pub fn surface_metrics(
    dem: &Raster,
    window_radius: f64,
    selection: SurfaceSelection,
) -> Result<SurfaceMetrics> {
    if !(window_radius.is_finite() && window_radius > 0.0) {
        return Err(TerrainError::InvalidParameter {
            name: "window_radius",
            value: window_radius.to_string(),
            reason: "must be a positive number of map units".into(),
        });
    }
    let radius = window_radius.max(std::f64::consts::SQRT_2 * dem.cellsize);
    let kernel = Kernel::new(radius, dem.cellsize).ok_or_else(|| TerrainError::InvalidParameter {
        name: "window_radius",
        value: window_radius.to_string(),
        reason: "fitting window is degenerate".into(),
    })?;

    let make = |wanted: bool| wanted.then(|| dem.empty_like());
    let mut elevation = make(selection.elevation);
    let mut slope = make(selection.slope);
    let mut aspect = make(selection.aspect);
    let mut curvature = make(selection.curvature);
    let mut planform = make(selection.planform_curvature);
    let mut profile = make(selection.profile_curvature);

    let (w, h, k) = (dem.width, dem.height, kernel.reach);
    let mut window = vec![0.0f64; kernel.offsets.len()];

    if w > 2 * k && h > 2 * k {
        for r in k..h - k {
            'cells: for c in k..w - k {
                let idx = r * w + c;
                if !dem.is_valid_at(idx) {
                    continue;
                }
                let zc = dem.data[idx] as f64;
                for (slot, &(dr, dc)) in window.iter_mut().zip(kernel.offsets.iter()) {
                    let v = dem.get((r as isize + dr) as usize, (c as isize + dc) as usize);
                    if dem.is_nodata(v) {
                        continue 'cells;
                    }
                    *slot = v as f64 - zc;
                }
                let coef: [f64; 6] = std::array::from_fn(|j| {
                    kernel.weights[j].iter().zip(window.iter()).map(|(wt, z)| wt * z).sum()
                });
                let [a, b, cc, d, e, f] = coef;
                let g2 = d * d + e * e;

                if let Some(out) = elevation.as_mut() {
                    out.data[idx] = (f + zc) as f32;
                }
                if let Some(out) = slope.as_mut() {
                    out.data[idx] = g2.sqrt() as f32;
                }
                if let Some(out) = curvature.as_mut() {
                    out.data[idx] = (2.0 * a + 2.0 * b) as f32;
                }
                if g2 > 0.0 {
                    if let Some(out) = aspect.as_mut() {
                        let az = (-d).atan2(-e).to_degrees();
                        out.data[idx] = (if az < 0.0 { az + 360.0 } else { az }) as f32;
                    }
                    if let Some(out) = planform.as_mut() {
                        out.data[idx] = (-2.0 * (a * e * e + b * d * d - cc * d * e) / g2.powf(1.5)) as f32;
                    }
                    if let Some(out) = profile.as_mut() {
                        out.data[idx] = (-2.0 * (a * d * d + b * e * e + cc * d * e)
                            / (g2 * (1.0 + g2).powf(1.5))) as f32;
                    }
                }
            }
        }
    }

    Ok(SurfaceMetrics {
        elevation,
        slope,
        aspect,
        curvature,
        planform_curvature: planform,
        profile_curvature: profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn surface(n: usize, cellsize: f64, z: impl Fn(f64, f64) -> f64) -> Raster {
        let mut r = Raster::flat(n, n, 0.0);
        r.cellsize = cellsize;
        for row in 0..n {
            for col in 0..n {
                let (x, y) = r.cell_centre(row, col);
                r.set(row, col, z(x, y) as f32);
            }
        }
        r
    }

    const ALL: SurfaceSelection = SurfaceSelection {
        elevation: true,
        slope: true,
        aspect: true,
        curvature: true,
        planform_curvature: true,
        profile_curvature: true,
    };

    #[test]
    fn plane_has_constant_slope_and_zero_curvature() {
        let dem = surface(15, 2.0, |x, _| 0.3 * x + 100.0);
        let m = surface_metrics(&dem, 4.0, ALL).unwrap();
        let slope = m.slope.unwrap();
        let curv = m.curvature.unwrap();
        let aspect = m.aspect.unwrap();
        let (r, c) = (7, 7);
        assert_relative_eq!(slope.get(r, c), 0.3, epsilon = 1e-4);
        assert!(curv.get(r, c).abs() < 1e-4);
        // Rising to the east → facing west.
        assert_relative_eq!(aspect.get(r, c), 270.0, epsilon = 1e-3);
    }

    #[test]
    fn paraboloid_curvature_is_recovered() {
        // z = −0.01 x² − 0.02 y² → 2a + 2b = −0.06 everywhere.
        let dem = surface(21, 1.0, |x, y| {
            let (x, y) = (x - 10.5, y - 10.5);
            500.0 - 0.01 * x * x - 0.02 * y * y
        });
        let m = surface_metrics(&dem, 3.0, SurfaceSelection::SLOPE_AND_CURVATURE).unwrap();
        assert!(m.elevation.is_none() && m.aspect.is_none());
        let curv = m.curvature.unwrap();
        for r in 5..16 {
            for c in 5..16 {
                assert_relative_eq!(curv.get(r, c), -0.06, epsilon = 1e-3);
            }
        }
        // The summit is flat.
        assert!(m.slope.unwrap().get(10, 10) < 1e-3);
    }

    #[test]
    fn window_edges_and_nodata_neighbours_are_nodata() {
        let mut dem = surface(12, 1.0, |x, y| x + y);
        dem.set(6, 6, dem.nodata);
        let m = surface_metrics(&dem, 2.0, SurfaceSelection::SLOPE_AND_CURVATURE).unwrap();
        let slope = m.slope.unwrap();
        // Reach is 2 cells: rows/cols 0, 1, 10, 11 are outside the fit.
        assert!(slope.is_nodata(slope.get(1, 5)));
        assert!(slope.is_nodata(slope.get(5, 10)));
        assert!(slope.is_nodata(slope.get(6, 6)));
        assert!(slope.is_nodata(slope.get(5, 5)));
        assert!(!slope.is_nodata(slope.get(2, 2)));
    }

    #[test]
    fn small_window_is_clamped_to_three_by_three() {
        let dem = surface(6, 1.0, |x, y| x * y);
        let m = surface_metrics(&dem, 0.1, SurfaceSelection::SLOPE_AND_CURVATURE).unwrap();
        let slope = m.slope.unwrap();
        assert!(!slope.is_nodata(slope.get(1, 1)));
        assert!(slope.is_nodata(slope.get(0, 1)));
    }

    #[test]
    fn non_positive_window_is_rejected() {
        let dem = Raster::flat(8, 8, 0.0);
        assert!(surface_metrics(&dem, 0.0, ALL).is_err());
        assert!(surface_metrics(&dem, f64::NAN, ALL).is_err());
    }
}
