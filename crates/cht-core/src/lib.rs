//! Hilltop curvature across DEM resolutions.
//!
//! For every resolution of a DEM set the terrain pipeline fills the DEM, fits
//! slope and curvature surfaces, builds the channel network from mapped
//! channel heads and extracts hilltops; the sweep then summarises the
//! hilltop curvature distribution into one table row and one histogram file.
pub mod config;
pub mod error;
pub mod hydraulic;
pub mod io;
pub mod pipeline;
pub mod raster;
pub mod stats;
pub mod sweep;
pub mod terrain;

pub use config::{ConfigError, Resolution, SweepConfig, SweepSettings};
pub use error::TerrainError;
pub use pipeline::{NativePipeline, PipelineParams, TerrainPipeline};
pub use raster::{Raster, DEFAULT_NODATA};
pub use stats::{BoxplotStats, StatsError};
pub use sweep::{run_sweep, Stage, SummaryRow, SummaryTable, SweepController, SweepError, SweepReport};
