//! Distribution summaries over flattened raster samples.
pub mod boxplot;
pub mod histogram;
pub mod sample;

use std::path::PathBuf;

use thiserror::Error;

pub use boxplot::{percentile, summarize, BoxplotStats};
pub use histogram::{emit_histogram, Histogram};
pub use sample::{flatten, flatten_without_nodata};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("sample is empty")]
    EmptySample,

    #[error("bin width must be positive and finite, got {0}")]
    InvalidBinWidth(f32),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
