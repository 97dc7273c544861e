//! Terrain primitives: depression filling, polynomial surface fitting and
//! hilltop curvature extraction.
pub mod fill;
pub mod hilltops;
pub mod polyfit;

pub use fill::fill;
pub use hilltops::{hilltop_curvature, remove_positive_curvature};
pub use polyfit::{surface_metrics, SurfaceMetrics, SurfaceSelection};

/// D8 neighbour offsets `(d_row, d_col)`, clockwise from north-west.
pub(crate) const D8_OFFSETS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, 1),
    (1, 1), (1, 0), (1, -1),
    (0, -1),
];

/// Step length of each D8 offset in cell units.
pub(crate) const D8_STEP: [f64; 8] = [
    std::f64::consts::SQRT_2, 1.0, std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2, 1.0, std::f64::consts::SQRT_2,
    1.0,
];
