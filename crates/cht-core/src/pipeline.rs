//! Terrain pipeline: DEM in, filtered hilltop-curvature raster out.
//!
//! The sweep controller only sees [`TerrainPipeline`]; [`NativePipeline`] is
//! the built-in implementation over this crate's terrain and hydraulic
//! modules.
use std::path::PathBuf;

use log::debug;

use crate::config::{Resolution, SweepConfig};
use crate::error::Result;
use crate::hydraulic::{BoundaryCondition, ChannelHeadInput, FlowInfo, JunctionNetwork};
use crate::io::load_dem;
use crate::raster::Raster;
use crate::terrain::{fill, hilltop_curvature, remove_positive_curvature, surface_metrics, SurfaceSelection};

/// Produces the hilltop curvature raster for one resolution.
///
/// Implementations must not share mutable state between calls; the sweep may
/// invoke them for several resolutions at once.
pub trait TerrainPipeline: Sync {
    fn hilltop_curvature(&self, resolution: Resolution) -> Result<Raster>;
}

impl<P: TerrainPipeline + ?Sized> TerrainPipeline for &P {
    fn hilltop_curvature(&self, resolution: Resolution) -> Result<Raster> {
        (**self).hilltop_curvature(resolution)
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

/// Inputs of [`NativePipeline`] that do not vary with resolution.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub data_dir: PathBuf,
    pub prefix: String,
    pub dem_format: String,
    /// Surface-fitting window radius, map units.
    pub window_radius: f64,
    pub min_slope: f32,
    pub boundary_conditions: [BoundaryCondition; 4],
    pub channel_head_stem: PathBuf,
    pub channel_head_format: String,
    pub channel_head_input: ChannelHeadInput,
    pub hilltop_slope_threshold: f32,
}

impl PipelineParams {
    pub fn from_config(config: &SweepConfig) -> Self {
        let s = &config.settings;
        Self {
            data_dir: config.data_dir.clone(),
            prefix: config.prefix.clone(),
            dem_format: config.dem_format.clone(),
            window_radius: config.window_size as f64,
            min_slope: s.min_slope,
            boundary_conditions: s.boundary_conditions,
            channel_head_stem: config.channel_head_stem(),
            channel_head_format: s.channel_head_format.clone(),
            channel_head_input: s.channel_head_input,
            hilltop_slope_threshold: s.hilltop_slope_threshold,
        }
    }
}

// ── Native implementation ─────────────────────────────────────────────────────

pub struct NativePipeline {
    params: PipelineParams,
}

impl NativePipeline {
    pub fn new(params: PipelineParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(PipelineParams::from_config(config))
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }
}

impl TerrainPipeline for NativePipeline {
    /// Pipeline order:
    ///   1. Load and fill the DEM
    ///   2. Fit slope and curvature surfaces
    ///   3. Route flow and build the channel network from channel heads
    ///   4. Extract ridges, then low-slope hilltops
    ///   5. Sample curvature on hilltops and drop positive values
    fn hilltop_curvature(&self, resolution: Resolution) -> Result<Raster> {
        let p = &self.params;

        // ── 1. DEM ──────────────────────────────────────────────────────────
        let dem = load_dem(&p.data_dir, &p.prefix, resolution.get(), &p.dem_format)?;
        debug!("[{resolution}] loaded {}x{} DEM, cellsize {}", dem.width, dem.height, dem.cellsize);
        let filled = fill(&dem, p.min_slope);
        debug!("[{resolution}] filled depressions");

        // ── 2. Surfaces ─────────────────────────────────────────────────────
        let surfaces = surface_metrics(&filled, p.window_radius, SurfaceSelection::SLOPE_AND_CURVATURE)?;
        let slope = surfaces.slope.unwrap_or_else(|| filled.empty_like());
        let curvature = surfaces.curvature.unwrap_or_else(|| filled.empty_like());
        debug!("[{resolution}] fitted surfaces over a {} m window", p.window_radius);

        // ── 3. Flow and channels ────────────────────────────────────────────
        let flow = FlowInfo::new(&p.boundary_conditions, &filled);
        let sources =
            flow.ingest_channel_heads(&p.channel_head_stem, &p.channel_head_format, p.channel_head_input)?;
        let network = JunctionNetwork::new(&sources, &flow);
        debug!(
            "[{resolution}] {} sources, {} junctions, max order {}",
            sources.len(),
            network.junction_count(),
            network.max_order()
        );

        // ── 4. Ridges and hilltops ──────────────────────────────────────────
        let ridges = network.extract_ridges(&flow);
        let hilltops = network.extract_hilltops(&ridges, &slope, p.hilltop_slope_threshold)?;
        debug!("[{resolution}] {} hilltop cells", hilltops.valid_count());

        // ── 5. Hilltop curvature ────────────────────────────────────────────
        let cht = hilltop_curvature(&filled, &curvature, &hilltops)?;
        let cht = remove_positive_curvature(&filled, &cht)?;
        debug!("[{resolution}] {} non-positive hilltop curvature cells", cht.valid_count());
        Ok(cht)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;

    #[test]
    fn params_follow_the_config() {
        let mut cfg = SweepConfig::new("/tmp/run", "GM", "asc", 7);
        cfg.settings.hilltop_slope_threshold = 0.25;
        let p = PipelineParams::from_config(&cfg);
        assert_eq!(p.window_radius, 7.0);
        assert_eq!(p.hilltop_slope_threshold, 0.25);
        assert_eq!(p.channel_head_stem, PathBuf::from("/tmp/run/GM_CH"));
    }

    #[test]
    fn missing_dem_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SweepConfig::new(dir.path(), "GM", "asc", 6);
        let pipe = NativePipeline::from_config(&cfg);
        let err = pipe.hilltop_curvature(Resolution::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, TerrainError::NotFound { .. }), "{err}");
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SweepConfig::new(dir.path(), "GM", "png", 6);
        let err = NativePipeline::from_config(&cfg)
            .hilltop_curvature(Resolution::new(1).unwrap())
            .unwrap_err();
        assert!(matches!(err, TerrainError::UnsupportedFormat(_)), "{err}");
    }
}
