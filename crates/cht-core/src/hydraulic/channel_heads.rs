//! Channel head (network source) ingestion.
//!
//! Channel heads come either from a CSV with a header row or from a raster in
//! which every valid cell is a head. For CSV input, [`ChannelHeadInput`]
//! selects the columns that locate each head.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::flow_routing::FlowInfo;
use crate::error::{Result, TerrainError};
use crate::io::{read_raster_ext, with_extension, RasterFormat};

/// How CSV rows locate a channel head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHeadInput {
    /// `node` column: row-major cell index on the DEM grid.
    NodeIndex,
    /// `row` and `col` columns.
    RowCol,
    /// `x` and `y` map coordinates.
    Coordinates,
}

impl ChannelHeadInput {
    fn columns(self) -> &'static [&'static str] {
        match self {
            ChannelHeadInput::NodeIndex => &["node"],
            ChannelHeadInput::RowCol => &["row", "col"],
            ChannelHeadInput::Coordinates => &["x", "y"],
        }
    }
}

impl FlowInfo {
    /// Read channel heads from `<stem>.<format>` and return the valid cells
    /// they fall on, sorted and de-duplicated. Heads outside the grid or on
    /// no-data are skipped with a warning.
    pub fn ingest_channel_heads(
        &self,
        stem: &Path,
        format: &str,
        input: ChannelHeadInput,
    ) -> Result<Vec<usize>> {
        let candidates = if format.eq_ignore_ascii_case("csv") {
            self.heads_from_csv(&with_extension(stem, format), input)?
        } else {
            let fmt: RasterFormat = format.parse()?;
            let raster = read_raster_ext(stem, fmt, format)?;
            raster
                .data
                .iter()
                .enumerate()
                .filter(|&(_, &v)| !raster.is_nodata(v))
                .map(|(i, _)| {
                    let (r, c) = raster.row_col(i);
                    let (x, y) = raster.cell_centre(r, c);
                    self.node_at(x, y)
                })
                .collect()
        };

        let total = candidates.len();
        let mut sources: Vec<usize> = candidates.into_iter().flatten().collect();
        let skipped = total - sources.len();
        if skipped > 0 {
            warn!(
                "{skipped} of {total} channel heads in {} fall outside the valid DEM area",
                stem.display()
            );
        }
        sources.sort_unstable();
        sources.dedup();
        debug!("ingested {} channel heads", sources.len());
        Ok(sources)
    }

    /// One entry per data row; None when the row does not land on a valid cell.
    fn heads_from_csv(&self, path: &Path, input: ChannelHeadInput) -> Result<Vec<Option<usize>>> {
        let file = File::open(path).map_err(|e| TerrainError::from_read(path, e))?;
        let csv_err = |e: csv::Error| TerrainError::format(path, e.to_string());
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers = reader.headers().map_err(csv_err)?;
        let cols: Vec<usize> = input
            .columns()
            .iter()
            .map(|name| {
                resolve_column(headers, name)
                    .ok_or_else(|| TerrainError::format(path, format!("no `{name}` column")))
            })
            .collect::<Result<_>>()?;

        let grid = self.template();
        let mut out = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            let value = |k: usize| -> Result<f64> {
                record
                    .get(cols[k])
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| {
                        TerrainError::format(path, format!("row {}: bad `{}`", row_idx + 1, input.columns()[k]))
                    })
            };
            let node = match input {
                ChannelHeadInput::NodeIndex => {
                    let v = value(0)?;
                    (v >= 0.0 && (v as usize) < grid.len())
                        .then_some(v as usize)
                        .filter(|&i| self.is_valid(i))
                }
                ChannelHeadInput::RowCol => {
                    let (r, c) = (value(0)?, value(1)?);
                    (r >= 0.0 && c >= 0.0 && (r as usize) < grid.height && (c as usize) < grid.width)
                        .then(|| grid.index(r as usize, c as usize))
                        .filter(|&i| self.is_valid(i))
                }
                ChannelHeadInput::Coordinates => self.node_at(value(0)?, value(1)?),
            };
            out.push(node);
        }
        Ok(out)
    }
}

/// Header position of `name`, ignoring case.
fn resolve_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}
