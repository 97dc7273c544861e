//! Boxplot statistics: 2nd/25th/50th/75th/98th percentiles, mean and extrema.
//!
//! Percentile p of a sorted sample of length n is read at the 0-based
//! position `p/100 · (n − 1)`, interpolating linearly between the two
//! neighbouring ranks.
use super::StatsError;

/// Summary of one sample, in the column order of the summary table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxplotStats {
    pub p2: f32,
    pub p25: f32,
    pub median: f32,
    pub mean: f32,
    pub p75: f32,
    pub p98: f32,
    pub min: f32,
    pub max: f32,
}

impl BoxplotStats {
    /// Column labels matching [`BoxplotStats::values`].
    pub const LABELS: [&'static str; 8] =
        ["2pc", "25pc", "median", "mean", "75pc", "98pc", "minimum", "maximum"];

    /// Fields in table order.
    pub fn values(&self) -> [f32; 8] {
        [self.p2, self.p25, self.median, self.mean, self.p75, self.p98, self.min, self.max]
    }
}

/// Rank-interpolated percentile `p` (0–100) of an ascending slice.
/// None for an empty slice.
pub fn percentile(sorted: &[f32], p: f64) -> Option<f32> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let pos = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f64;
    let (a, b) = (sorted[lo] as f64, sorted[hi] as f64);
    Some((a + frac * (b - a)) as f32)
}

/// Summarise `sample`. Fails on an empty sample.
pub fn summarize(sample: &[f32]) -> Result<BoxplotStats, StatsError> {
    if sample.is_empty() {
        return Err(StatsError::EmptySample);
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(f32::total_cmp);

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let mean = (sorted.iter().map(|&v| v as f64).sum::<f64>() / sorted.len() as f64) as f32;
    let pct = |p: f64| percentile(&sorted, p).unwrap_or(min);

    Ok(BoxplotStats {
        p2: pct(2.0),
        p25: pct(25.0),
        median: pct(50.0),
        mean: mean.clamp(min, max),
        p75: pct(75.0),
        p98: pct(98.0),
        min,
        max,
    })
}
