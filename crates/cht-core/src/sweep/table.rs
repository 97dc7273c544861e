//! The `<prefix>_ChtResData.txt` summary table.
//!
//! One header line, then one space-separated row per resolution in sweep
//! order. Rows are flushed as they are appended, so the rows of every
//! completed resolution are on disk even if the sweep stops early; an
//! abandoned table ends with a `# INCOMPLETE: <reason>` line.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Resolution;
use crate::stats::BoxplotStats;

/// Statistics of one resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRow {
    pub resolution: Resolution,
    pub stats: BoxplotStats,
}

impl SummaryRow {
    /// Row text without the trailing newline.
    pub fn format(&self) -> String {
        let mut line = self.resolution.to_string();
        for v in self.stats.values() {
            line.push(' ');
            line.push_str(&v.to_string());
        }
        line
    }
}

/// Column header line, without the trailing newline.
pub fn header_line() -> String {
    let mut line = String::from("resolution");
    for label in BoxplotStats::LABELS {
        line.push(' ');
        line.push_str(label);
    }
    line
}

pub struct SummaryTable<W: Write = BufWriter<File>> {
    out: W,
    path: PathBuf,
    header_written: bool,
    rows: usize,
}

impl SummaryTable {
    /// Create (or truncate) the table file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file), path))
    }
}

impl<W: Write> SummaryTable<W> {
    /// Table over any writer; `path` is only used in messages.
    pub fn from_writer(out: W, path: impl Into<PathBuf>) -> Self {
        Self { out, path: path.into(), header_written: false, rows: 0 }
    }

    /// Write the column header. Allowed once, before any row.
    pub fn write_header(&mut self) -> io::Result<()> {
        if self.header_written {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "summary table header already written",
            ));
        }
        writeln!(self.out, "{}", header_line())?;
        self.out.flush()?;
        self.header_written = true;
        Ok(())
    }

    pub fn append_row(&mut self, row: &SummaryRow) -> io::Result<()> {
        if !self.header_written {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "summary row appended before the header",
            ));
        }
        writeln!(self.out, "{}", row.format())?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and hand back the writer.
    pub fn close(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    /// Mark the table incomplete, then close it.
    pub fn abandon(mut self, reason: &str) -> io::Result<W> {
        let reason = reason.replace(['\n', '\r'], " ");
        writeln!(self.out, "# INCOMPLETE: {reason}")?;
        self.close()
    }
}
