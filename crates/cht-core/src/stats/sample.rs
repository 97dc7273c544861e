//! Raster → 1D sample reduction.
use crate::raster::Raster;

/// Every value in `data` that is finite and not equal to `nodata`, in
/// storage order.
pub fn flatten(data: &[f32], nodata: f32) -> Vec<f32> {
    data.iter().copied().filter(|&v| v != nodata && v.is_finite()).collect()
}

/// Row-major sample of the valid cells of `raster`.
pub fn flatten_without_nodata(raster: &Raster) -> Vec<f32> {
    flatten(&raster.data, raster.nodata)
}
