//! Sweep configuration: the resolution list, statistics and terrain
//! parameters, and the file naming convention under the data directory.
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hydraulic::{BoundaryCondition, ChannelHeadInput};
use crate::io::dem_stem;

// ── Resolution ────────────────────────────────────────────────────────────────

/// Grid resolution label of one DEM in the sweep (a positive integer, used
/// verbatim in file names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(NonZeroU32);

impl Resolution {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot parse settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Tunables of a sweep. Missing keys in a settings file take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Resolutions in sweep (and output row) order.
    pub resolutions: Vec<Resolution>,
    /// Histogram bin width, curvature units.
    pub bin_width: f32,
    /// Minimum gradient imposed across filled flats.
    pub min_slope: f32,
    /// Ridge cells steeper than this are not hilltops.
    pub hilltop_slope_threshold: f32,
    /// Edge conditions, N, E, S, W.
    pub boundary_conditions: [BoundaryCondition; 4],
    /// Extension of the `<prefix>_CH` channel head file.
    pub channel_head_format: String,
    pub channel_head_input: ChannelHeadInput,
    /// Process resolutions concurrently (needs the `threading` feature).
    pub parallel: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            resolutions: (1..=10).filter_map(Resolution::new).collect(),
            bin_width: 0.01,
            min_slope: 0.0001,
            hilltop_slope_threshold: 0.4,
            boundary_conditions: [BoundaryCondition::NoFlux; 4],
            channel_head_format: "csv".to_string(),
            channel_head_input: ChannelHeadInput::Coordinates,
            parallel: false,
        }
    }
}

impl SweepSettings {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return Err(ConfigError::Invalid {
                name: "bin_width",
                reason: format!("must be positive, got {}", self.bin_width),
            });
        }
        if !(self.min_slope.is_finite() && self.min_slope >= 0.0) {
            return Err(ConfigError::Invalid {
                name: "min_slope",
                reason: format!("must be non-negative, got {}", self.min_slope),
            });
        }
        if !self.hilltop_slope_threshold.is_finite() {
            return Err(ConfigError::Invalid {
                name: "hilltop_slope_threshold",
                reason: "must be finite".into(),
            });
        }
        let mut seen = self.resolutions.clone();
        seen.sort_unstable();
        if seen.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::Invalid {
                name: "resolutions",
                reason: "each resolution may appear once".into(),
            });
        }
        Ok(())
    }
}

// ── Sweep configuration ───────────────────────────────────────────────────────

/// Everything one sweep needs: where the inputs live, how they are named,
/// and the settings above.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub data_dir: PathBuf,
    pub prefix: String,
    pub dem_format: String,
    /// Surface-fitting window radius, map units.
    pub window_size: u32,
    pub settings: SweepSettings,
}

impl SweepConfig {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        dem_format: impl Into<String>,
        window_size: u32,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix: prefix.into(),
            dem_format: dem_format.into(),
            window_size,
            settings: SweepSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SweepSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.settings.resolutions
    }

    /// `<dir>/<prefix>_<res>_DEM`, extension excluded.
    pub fn dem_stem(&self, res: Resolution) -> PathBuf {
        dem_stem(&self.data_dir, &self.prefix, res.get())
    }

    /// `<dir>/<prefix>_CH`, extension excluded.
    pub fn channel_head_stem(&self) -> PathBuf {
        self.data_dir.join(format!("{}_CH", self.prefix))
    }

    /// `<dir>/<prefix>_ChtResData.txt`
    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}_ChtResData.txt", self.prefix))
    }

    /// `<dir>/<prefix>_<res>_Hist_CHT.txt`
    pub fn histogram_path(&self, res: Resolution) -> PathBuf {
        self.data_dir.join(format!("{}_{}_Hist_CHT.txt", self.prefix, res))
    }
}
