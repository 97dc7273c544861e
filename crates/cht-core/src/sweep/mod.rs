//! Resolution sweep: hilltop curvature statistics for every DEM resolution.
//!
//! Each resolution goes through load → reduce → summarize → emit → record.
//! The first failure stops the sweep; rows already recorded stay in the
//! table, which is then marked incomplete.
pub mod error;
pub mod table;

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

pub use error::{Stage, SweepError};
pub use table::{header_line, SummaryRow, SummaryTable};

use crate::config::{Resolution, SweepConfig};
use crate::pipeline::TerrainPipeline;
use crate::stats::{emit_histogram, flatten_without_nodata, summarize};

/// Result of a completed sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub table: PathBuf,
    /// One row per resolution, in sweep order.
    pub rows: Vec<SummaryRow>,
    pub histograms: Vec<PathBuf>,
}

/// Everything produced for one resolution before it is recorded.
struct Processed {
    row: SummaryRow,
    histogram: PathBuf,
    cells: usize,
}

pub struct SweepController<'a, P> {
    config: &'a SweepConfig,
    pipeline: P,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, P: TerrainPipeline> SweepController<'a, P> {
    pub fn new(config: &'a SweepConfig, pipeline: P) -> Self {
        Self { config, pipeline, cancel: None }
    }

    /// Stop before the next resolution once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Open the table at the configured path, run every resolution, then close
    /// the table, or mark it incomplete if the sweep failed.
    pub fn run_to_file(&self) -> Result<SweepReport, SweepError> {
        self.config.settings.validate()?;
        let path = self.config.table_path();
        let mut table =
            SummaryTable::open(&path).map_err(|e| SweepError::output(None, Stage::Open, &path, e))?;
        table
            .write_header()
            .map_err(|e| SweepError::output(None, Stage::Open, &path, e))?;

        match self.run(&mut table) {
            Ok(report) => {
                table.close().map_err(|e| SweepError::output(None, Stage::Close, &path, e))?;
                info!("wrote {} rows to {}", report.rows.len(), path.display());
                Ok(report)
            }
            Err(err) => {
                if let Err(close_err) = table.abandon(&err.to_string()) {
                    warn!("could not mark {} incomplete: {close_err}", path.display());
                }
                Err(err)
            }
        }
    }

    /// Process every configured resolution into `table`, writing the header
    /// first if it is not there yet.
    pub fn run<W: Write>(&self, table: &mut SummaryTable<W>) -> Result<SweepReport, SweepError> {
        self.config.settings.validate()?;
        if !table.header_written() {
            table
                .write_header()
                .map_err(|e| SweepError::output(None, Stage::Open, table.path(), e))?;
        }
        let mut report = SweepReport { table: table.path().to_path_buf(), ..Default::default() };

        if self.config.settings.parallel {
            #[cfg(feature = "threading")]
            return self.run_parallel(table, report);
            #[cfg(not(feature = "threading"))]
            warn!("parallel sweep requested without the `threading` feature; running sequentially");
        }

        for &res in self.config.resolutions() {
            self.check_cancelled(res)?;
            let done = self.process(res)?;
            Self::record(table, done, &mut report)?;
        }
        Ok(report)
    }

    /// Run resolutions concurrently, then record rows in sweep order up to the
    /// first failed resolution.
    #[cfg(feature = "threading")]
    fn run_parallel<W: Write>(
        &self,
        table: &mut SummaryTable<W>,
        mut report: SweepReport,
    ) -> Result<SweepReport, SweepError> {
        use rayon::prelude::*;

        let outcomes: Vec<Result<Processed, SweepError>> = self
            .config
            .resolutions()
            .par_iter()
            .map(|&res| {
                self.check_cancelled(res)?;
                self.process(res)
            })
            .collect();

        for outcome in outcomes {
            Self::record(table, outcome?, &mut report)?;
        }
        Ok(report)
    }

    fn check_cancelled(&self, resolution: Resolution) -> Result<(), SweepError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(SweepError::Cancelled { resolution }),
            _ => Ok(()),
        }
    }

    /// Load, reduce, summarize and emit one resolution.
    fn process(&self, res: Resolution) -> Result<Processed, SweepError> {
        info!("resolution {res}: running terrain pipeline");
        let cht = self
            .pipeline
            .hilltop_curvature(res)
            .map_err(|e| SweepError::from_terrain(res, Stage::Load, e))?;

        let sample = flatten_without_nodata(&cht);
        if sample.is_empty() {
            return Err(SweepError::EmptySample { resolution: res, stage: Stage::Reduce });
        }

        let stats = summarize(&sample).map_err(|e| SweepError::from_stats(res, Stage::Summarize, e))?;

        let histogram = self.config.histogram_path(res);
        emit_histogram(&sample, self.config.settings.bin_width, &histogram)
            .map_err(|e| SweepError::from_stats(res, Stage::Emit, e))?;

        Ok(Processed { row: SummaryRow { resolution: res, stats }, histogram, cells: sample.len() })
    }

    fn record<W: Write>(
        table: &mut SummaryTable<W>,
        done: Processed,
        report: &mut SweepReport,
    ) -> Result<(), SweepError> {
        let res = done.row.resolution;
        table
            .append_row(&done.row)
            .map_err(|e| SweepError::output(Some(res), Stage::Record, table.path(), e))?;
        info!(
            "resolution {res}: {} hilltop cells, median {} (min {}, max {})",
            done.cells, done.row.stats.median, done.row.stats.min, done.row.stats.max
        );
        report.rows.push(done.row);
        report.histograms.push(done.histogram);
        Ok(())
    }
}

/// Run the whole sweep for `config` and write its summary table.
pub fn run_sweep<P: TerrainPipeline>(config: &SweepConfig, pipeline: P) -> Result<SweepReport, SweepError> {
    SweepController::new(config, pipeline).run_to_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepSettings;
    use crate::error::{Result as TerrainResult, TerrainError};
    use crate::raster::{Raster, DEFAULT_NODATA};
    use std::sync::atomic::AtomicUsize;

    /// Returns a fixed raster per resolution; NotFound for unknown ones.
    struct Fixed {
        rasters: Vec<(u32, Vec<f32>)>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(rasters: Vec<(u32, Vec<f32>)>) -> Self {
            Self { rasters, calls: AtomicUsize::new(0) }
        }
    }

    impl TerrainPipeline for Fixed {
        fn hilltop_curvature(&self, resolution: Resolution) -> TerrainResult<Raster> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (_, values) = self
                .rasters
                .iter()
                .find(|(r, _)| *r == resolution.get())
                .ok_or_else(|| TerrainError::NotFound { path: format!("R_{resolution}_DEM.bil").into() })?;
            Raster::from_data(values.clone(), values.len(), 1, 1.0, DEFAULT_NODATA)
        }
    }

    fn config(dir: &std::path::Path, resolutions: &[u32]) -> SweepConfig {
        let settings = SweepSettings {
            resolutions: resolutions.iter().filter_map(|&r| Resolution::new(r)).collect(),
            ..SweepSettings::default()
        };
        SweepConfig::new(dir, "R", "bil", 6).with_settings(settings)
    }

    #[test]
    fn rows_follow_sweep_order() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &[2, 1]);
        let pipe = Fixed::new(vec![(1, vec![-0.1, DEFAULT_NODATA, -0.3]), (2, vec![-0.2])]);
        let mut table = SummaryTable::from_writer(Vec::new(), "mem");
        let report = SweepController::new(&cfg, &pipe).run(&mut table).unwrap();

        let order: Vec<u32> = report.rows.iter().map(|r| r.resolution.get()).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(report.rows[1].stats.min, -0.3);
        let expected: Vec<PathBuf> = [2, 1]
            .iter()
            .map(|&r| cfg.histogram_path(Resolution::new(r).unwrap()))
            .collect();
        assert_eq!(report.histograms, expected);
        assert!(report.histograms.iter().all(|p| p.exists()));
        assert_eq!(table.rows_written(), 2);
    }

    #[test]
    fn all_nodata_raster_is_an_empty_sample() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &[1, 2]);
        let pipe = Fixed::new(vec![(1, vec![-0.1]), (2, vec![DEFAULT_NODATA; 4])]);
        let mut table = SummaryTable::from_writer(Vec::new(), "mem");
        let err = SweepController::new(&cfg, &pipe).run(&mut table).unwrap_err();
        assert!(matches!(err, SweepError::EmptySample { stage: Stage::Reduce, .. }), "{err}");
        assert_eq!(err.resolution(), Resolution::new(2));
        assert_eq!(table.rows_written(), 1);
        // No histogram for the failed resolution.
        assert!(!cfg.histogram_path(Resolution::new(2).unwrap()).exists());
    }

    #[test]
    fn cancellation_stops_before_the_next_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), &[1, 2]);
        let pipe = Fixed::new(vec![(1, vec![-0.1]), (2, vec![-0.2])]);
        let flag = Arc::new(AtomicBool::new(true));
        let mut table = SummaryTable::from_writer(Vec::new(), "mem");
        let err = SweepController::new(&cfg, &pipe)
            .with_cancel(flag)
            .run(&mut table)
            .unwrap_err();
        assert!(matches!(err, SweepError::Cancelled { .. }));
        assert_eq!(pipe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(table.rows_written(), 0);
    }

    #[test]
    fn invalid_settings_fail_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &[1]);
        cfg.settings.bin_width = 0.0;
        let pipe = Fixed::new(vec![(1, vec![-0.1])]);
        let mut table = SummaryTable::from_writer(Vec::new(), "mem");
        let err = SweepController::new(&cfg, &pipe).run(&mut table).unwrap_err();
        assert!(matches!(err, SweepError::Config(_)));
        assert_eq!(pipe.calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(feature = "threading")]
    #[test]
    fn parallel_rows_keep_sweep_order_and_stop_at_the_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), &[3, 1, 2]);
        cfg.settings.parallel = true;

        let pipe = Fixed::new(vec![(1, vec![-0.1]), (2, vec![-0.2]), (3, vec![-0.3])]);
        let mut table = SummaryTable::from_writer(Vec::new(), "mem");
        let report = SweepController::new(&cfg, &pipe).run(&mut table).unwrap();
        let order: Vec<u32> = report.rows.iter().map(|r| r.resolution.get()).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(pipe.calls.load(Ordering::SeqCst), 3);

        // Resolution 1 has no DEM: only the row before it is recorded.
        let pipe = Fixed::new(vec![(2, vec![-0.2]), (3, vec![-0.3])]);
        let mut table = SummaryTable::from_writer(Vec::new(), "mem");
        let err = SweepController::new(&cfg, &pipe).run(&mut table).unwrap_err();
        assert!(matches!(err, SweepError::InputNotFound { .. }), "{err}");
        assert_eq!(err.resolution(), Resolution::new(1));
        assert_eq!(table.rows_written(), 1);
        let text = String::from_utf8(table.close().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2, "{text}");
        assert!(lines[1].starts_with("3 "), "{text}");
    }
}
