//! Fixed-width histograms written as plain text.
//!
//! Bins start at the sample minimum: the first is `[min, min + w]`, every
//! later one `(lower, upper]`, so a value on a shared edge counts in the lower
//! bin. All bins across the span are written, empty ones included.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;

use super::StatsError;

/// Slack, in bin widths, for a value sitting on a bin edge.
const EDGE_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub bin_width: f64,
    pub counts: Vec<u64>,
    /// Number of binned values.
    pub n: u64,
}

/// One row of a histogram file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
    pub density: f64,
}

impl HistogramBin {
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }
}

impl Histogram {
    pub const HEADER: &'static str = "midpoint lower_limit upper_limit count probability_density";

    /// Bin `sample` with width `bin_width`.
    pub fn from_sample(sample: &[f32], bin_width: f32) -> Result<Self, StatsError> {
        if !(bin_width.is_finite() && bin_width > 0.0) {
            return Err(StatsError::InvalidBinWidth(bin_width));
        }
        if sample.is_empty() {
            return Err(StatsError::EmptySample);
        }
        let w = bin_width as f64;
        let (min, max) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });

        // Samples carry f32 rounding, so the edge slack grows with magnitude.
        let slack = EDGE_EPS + 4.0 * f32::EPSILON as f64 * min.abs().max(max.abs()) / w;

        let n_bins = (((max - min) / w - slack).ceil() as usize).max(1);
        let mut counts = vec![0u64; n_bins];
        for &v in sample {
            let k = ((v as f64 - min) / w - slack).ceil() as i64 - 1;
            counts[k.clamp(0, n_bins as i64 - 1) as usize] += 1;
        }

        Ok(Self { min, bin_width: w, counts, n: sample.len() as u64 })
    }

    pub fn bins(&self) -> impl Iterator<Item = HistogramBin> + '_ {
        let norm = self.n as f64 * self.bin_width;
        self.counts.iter().enumerate().map(move |(i, &count)| {
            let lower = self.min + i as f64 * self.bin_width;
            HistogramBin { lower, upper: lower + self.bin_width, count, density: count as f64 / norm }
        })
    }

    /// Write header plus one line per bin, creating or truncating `path`.
    pub fn write(&self, path: &Path) -> Result<(), StatsError> {
        let io_err = |source| StatsError::Io { path: path.to_path_buf(), source };
        let file = File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", Self::HEADER).map_err(io_err)?;
        for bin in self.bins() {
            writeln!(
                out,
                "{} {} {} {} {}",
                bin.midpoint() as f32,
                bin.lower as f32,
                bin.upper as f32,
                bin.count,
                bin.density as f32
            )
            .map_err(io_err)?;
        }
        out.flush().map_err(io_err)
    }
}

/// Bin `sample` and write it to `path`.
pub fn emit_histogram(sample: &[f32], bin_width: f32, path: &Path) -> Result<Histogram, StatsError> {
    let hist = Histogram::from_sample(sample, bin_width)?;
    hist.write(path)?;
    debug!("wrote {} bins to {}", hist.counts.len(), path.display());
    Ok(hist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;

    #[test]
    fn counts_cover_the_sample_exactly_once() {
        let sample = [-0.1, -0.2, -0.05, -0.3, -0.15, -0.151, -0.299];
        let h = Histogram::from_sample(&sample, 0.01).unwrap();
        assert_eq!(h.counts.iter().sum::<u64>(), sample.len() as u64);
        assert_eq!(h.counts.len(), 25);
        assert_relative_eq!(h.min, -0.3f32 as f64);
    }

    #[test]
    fn edge_values_fall_in_the_lower_bin() {
        // Edges at 0, 1, 2, 3.
        let h = Histogram::from_sample(&[0.0, 1.0, 2.0, 2.5, 3.0], 1.0).unwrap();
        assert_eq!(h.counts, vec![2, 1, 2]);
    }

    #[test]
    fn identical_values_share_one_bin() {
        let h = Histogram::from_sample(&[-0.4, -0.4, -0.4], 0.01).unwrap();
        assert_eq!(h.counts, vec![3]);
        let bin = h.bins().next().unwrap();
        assert_relative_eq!(bin.density, 3.0 / (3.0 * 0.01f32 as f64));
    }

    #[test]
    fn density_integrates_to_one() {
        let sample: Vec<f32> = (0..200).map(|i| -(i as f32) * 0.0037).collect();
        let h = Histogram::from_sample(&sample, 0.02).unwrap();
        let area: f64 = h.bins().map(|b| b.density * h.bin_width).sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_sample_and_bad_width_are_rejected() {
        assert!(matches!(Histogram::from_sample(&[], 0.01), Err(StatsError::EmptySample)));
        assert!(matches!(
            Histogram::from_sample(&[1.0], 0.0),
            Err(StatsError::InvalidBinWidth(_))
        ));
        assert!(matches!(
            Histogram::from_sample(&[1.0], f32::NAN),
            Err(StatsError::InvalidBinWidth(_))
        ));
    }

    #[test]
    fn file_has_header_and_one_line_per_bin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GM_1_Hist_CHT.txt");
        let hist = emit_histogram(&[0.0, 0.5, 2.5], 1.0, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], Histogram::HEADER);
        assert_eq!(lines.len(), 1 + hist.counts.len());
        // Empty middle bin is still written.
        assert_eq!(lines[2], "1.5 1 2 0 0");
        assert_eq!(lines[1], "0.5 0 1 2 0.6666667");
    }

    #[test]
    fn unwritable_destination_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("h.txt");
        assert!(matches!(
            emit_histogram(&[1.0, 2.0], 0.5, &path),
            Err(StatsError::Io { .. })
        ));
    }
}
