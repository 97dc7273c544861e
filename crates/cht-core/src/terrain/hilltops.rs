//! Hilltop curvature: surface curvature sampled on hilltop cells.
use crate::error::Result;
use crate::raster::Raster;

/// Curvature at every cell flagged in `hilltops`; no-data elsewhere.
///
/// `filled` fixes the grid (and sentinel) of the result.
pub fn hilltop_curvature(filled: &Raster, curvature: &Raster, hilltops: &Raster) -> Result<Raster> {
    filled.check_same_grid(curvature)?;
    filled.check_same_grid(hilltops)?;

    let mut out = filled.empty_like();
    for (idx, o) in out.data.iter_mut().enumerate() {
        let cv = curvature.data[idx];
        if hilltops.is_valid_at(idx) && filled.is_valid_at(idx) && !curvature.is_nodata(cv) {
            *o = cv;
        }
    }
    Ok(out)
}

/// Keep only non-positive curvature values; positive cells become no-data.
pub fn remove_positive_curvature(filled: &Raster, cht: &Raster) -> Result<Raster> {
    filled.check_same_grid(cht)?;

    let mut out = filled.empty_like();
    for (o, &v) in out.data.iter_mut().zip(cht.data.iter()) {
        if !cht.is_nodata(v) && v <= 0.0 {
            *o = v;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;

    #[test]
    fn curvature_is_masked_to_hilltops() {
        let filled = Raster::flat(3, 1, 10.0);
        let mut curv = filled.like(0.0);
        curv.data = vec![-0.1, -0.2, 0.3];
        let mut hill = filled.empty_like();
        hill.data[1] = 1.0;
        hill.data[2] = 2.0;

        let cht = hilltop_curvature(&filled, &curv, &hill).unwrap();
        assert!(cht.is_nodata(cht.data[0]));
        assert_eq!(cht.data[1], -0.2);
        assert_eq!(cht.data[2], 0.3);

        let neg = remove_positive_curvature(&filled, &cht).unwrap();
        assert_eq!(neg.valid_count(), 1);
        assert_eq!(neg.data[1], -0.2);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let a = Raster::flat(3, 3, 0.0);
        let b = Raster::flat(4, 3, 0.0);
        assert!(matches!(
            hilltop_curvature(&a, &b, &a),
            Err(TerrainError::GridMismatch { .. })
        ));
    }
}
