//! Sweep failures, each tagged with the resolution and stage it came from.
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{ConfigError, Resolution};
use crate::error::TerrainError;
use crate::stats::StatsError;

/// Step of the sweep at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Opening the summary table or writing its header.
    Open,
    /// Running the terrain pipeline.
    Load,
    /// Flattening the curvature raster.
    Reduce,
    Summarize,
    /// Writing the histogram file.
    Emit,
    /// Appending the summary row.
    Record,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Open => "open",
            Stage::Load => "load",
            Stage::Reduce => "reduce",
            Stage::Summarize => "summarize",
            Stage::Emit => "emit",
            Stage::Record => "record",
            Stage::Close => "close",
        })
    }
}

/// Shown in messages as `resolution N` or `sweep` when no resolution applies.
struct At(Option<Resolution>);

impl fmt::Display for At {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(r) => write!(f, "resolution {r}"),
            None => f.write_str("sweep"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("resolution {resolution}, {stage}: input missing or unreadable: {source}")]
    InputNotFound {
        resolution: Resolution,
        stage: Stage,
        #[source]
        source: TerrainError,
    },

    #[error("resolution {resolution}, {stage}: no valid hilltop curvature cells")]
    EmptySample { resolution: Resolution, stage: Stage },

    #[error("{}, {stage}: cannot write {}: {source}", At(*resolution), path.display())]
    OutputWrite {
        resolution: Option<Resolution>,
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("resolution {resolution}, {stage}: terrain pipeline failed: {source}")]
    Delegated {
        resolution: Resolution,
        stage: Stage,
        #[source]
        source: TerrainError,
    },

    #[error("sweep cancelled before resolution {resolution}")]
    Cancelled { resolution: Resolution },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SweepError {
    /// Resolution in progress when the sweep failed, if any.
    pub fn resolution(&self) -> Option<Resolution> {
        match self {
            SweepError::InputNotFound { resolution, .. }
            | SweepError::EmptySample { resolution, .. }
            | SweepError::Delegated { resolution, .. }
            | SweepError::Cancelled { resolution } => Some(*resolution),
            SweepError::OutputWrite { resolution, .. } => *resolution,
            SweepError::Config(_) => None,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            SweepError::InputNotFound { stage, .. }
            | SweepError::EmptySample { stage, .. }
            | SweepError::OutputWrite { stage, .. }
            | SweepError::Delegated { stage, .. } => *stage,
            SweepError::Cancelled { .. } => Stage::Load,
            SweepError::Config(_) => Stage::Open,
        }
    }

    /// Classify a terrain pipeline failure: missing or unreadable inputs are
    /// `InputNotFound`, everything else `Delegated`.
    pub(crate) fn from_terrain(resolution: Resolution, stage: Stage, source: TerrainError) -> Self {
        match source {
            TerrainError::NotFound { .. } | TerrainError::Unreadable { .. } => {
                SweepError::InputNotFound { resolution, stage, source }
            }
            source => SweepError::Delegated { resolution, stage, source },
        }
    }

    pub(crate) fn from_stats(resolution: Resolution, stage: Stage, source: StatsError) -> Self {
        match source {
            StatsError::EmptySample => SweepError::EmptySample { resolution, stage },
            StatsError::InvalidBinWidth(w) => SweepError::Config(ConfigError::Invalid {
                name: "bin_width",
                reason: format!("must be positive, got {w}"),
            }),
            StatsError::Io { path, source } => {
                SweepError::OutputWrite { resolution: Some(resolution), stage, path, source }
            }
        }
    }

    pub(crate) fn output(
        resolution: Option<Resolution>,
        stage: Stage,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        SweepError::OutputWrite { resolution, stage, path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(n: u32) -> Resolution {
        Resolution::new(n).unwrap()
    }

    #[test]
    fn missing_input_is_classified_apart_from_other_failures() {
        let missing = TerrainError::NotFound { path: "GM_3_DEM.bil".into() };
        let e = SweepError::from_terrain(res(3), Stage::Load, missing);
        assert!(matches!(e, SweepError::InputNotFound { .. }));
        assert_eq!(e.resolution(), Some(res(3)));
        assert_eq!(e.stage(), Stage::Load);

        let denied = TerrainError::Unreadable {
            path: "GM_3_DEM.hdr".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(matches!(
            SweepError::from_terrain(res(3), Stage::Load, denied),
            SweepError::InputNotFound { .. }
        ));

        let bad = TerrainError::UnsupportedFormat("png".into());
        assert!(matches!(
            SweepError::from_terrain(res(3), Stage::Load, bad),
            SweepError::Delegated { .. }
        ));
    }

    #[test]
    fn messages_name_resolution_and_stage() {
        let e = SweepError::EmptySample { resolution: res(7), stage: Stage::Reduce };
        assert_eq!(e.to_string(), "resolution 7, reduce: no valid hilltop curvature cells");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e = SweepError::output(None, Stage::Open, "/ro/GM_ChtResData.txt", io);
        assert!(e.to_string().starts_with("sweep, open: cannot write /ro/GM_ChtResData.txt"), "{e}");
        assert_eq!(e.resolution(), None);
    }
}
