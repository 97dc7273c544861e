//! Raster ingestion and export.
//!
//! Rasters are addressed by a path *stem* (no extension) plus a format tag,
//! the way DEMs are named on disk: `<dir>/<prefix>_<resolution>_DEM` + `bil`.
pub mod envi;
pub mod esri;
pub mod geotiff;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TerrainError};
use crate::raster::Raster;

/// On-disk raster encodings understood by [`read_raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// ENVI band-interleaved binary with `.hdr` sidecar.
    Bil,
    /// ESRI float grid with `.hdr` sidecar.
    Flt,
    /// ESRI ASCII grid.
    Asc,
    /// Single-band GeoTIFF.
    Tif,
}

impl RasterFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Bil => "bil",
            RasterFormat::Flt => "flt",
            RasterFormat::Asc => "asc",
            RasterFormat::Tif => "tif",
        }
    }
}

impl FromStr for RasterFormat {
    type Err = TerrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "bil" => Ok(RasterFormat::Bil),
            "flt" => Ok(RasterFormat::Flt),
            "asc" => Ok(RasterFormat::Asc),
            "tif" | "tiff" => Ok(RasterFormat::Tif),
            _ => Err(TerrainError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `stem` + `.` + `ext`, without treating dots already in the stem as an
/// extension (prefixes like `GM_0.5` are legal).
pub fn with_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut s: OsString = stem.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Stem of the DEM for one resolution: `<dir>/<prefix>_<resolution>_DEM`.
pub fn dem_stem(dir: &Path, prefix: &str, resolution: u32) -> PathBuf {
    dir.join(format!("{prefix}_{resolution}_DEM"))
}

/// Read the raster stored at `stem` in `format`, using the format's usual
/// extension (`.tif` falling back to `.tiff`).
pub fn read_raster(stem: &Path, format: RasterFormat) -> Result<Raster> {
    if format == RasterFormat::Tif && !with_extension(stem, "tif").exists() {
        return read_raster_ext(stem, format, "tiff");
    }
    read_raster_ext(stem, format, format.extension())
}

/// Read `<stem>.<ext>` as `format`. `ext` is taken verbatim, so `BIL` and
/// `bil` name different files; `.hdr` sidecars keep their lowercase name.
pub fn read_raster_ext(stem: &Path, format: RasterFormat, ext: &str) -> Result<Raster> {
    let ext = ext.trim_start_matches('.');
    match format {
        RasterFormat::Bil => envi::read_bil(stem, ext),
        RasterFormat::Flt => esri::read_flt(stem, ext),
        RasterFormat::Asc => esri::read_asc(&with_extension(stem, ext)),
        RasterFormat::Tif => geotiff::read_geotiff(&with_extension(stem, ext)),
    }
}

/// Load the DEM for `resolution` following the `<prefix>_<resolution>_DEM.<format>`
/// naming convention, with `format` as the file extension exactly as given.
pub fn load_dem(dir: &Path, prefix: &str, resolution: u32, format: &str) -> Result<Raster> {
    let fmt: RasterFormat = format.parse()?;
    read_raster_ext(&dem_stem(dir, prefix, resolution), fmt, format)
}

/// Write `raster` to `stem` in `format`. Only `asc` and `bil` are writable.
pub fn write_raster(raster: &Raster, stem: &Path, format: RasterFormat) -> Result<()> {
    match format {
        RasterFormat::Bil => envi::write_bil(raster, stem),
        RasterFormat::Asc => esri::write_asc(raster, &with_extension(stem, "asc")),
        other => Err(TerrainError::UnsupportedFormat(format!("{other} (write)"))),
    }
}

/// Decode a little- or big-endian f32 stream.
pub(crate) fn decode_f32(bytes: &[u8], big_endian: bool) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| {
            let arr = [b[0], b[1], b[2], b[3]];
            if big_endian { f32::from_be_bytes(arr) } else { f32::from_le_bytes(arr) }
        })
        .collect()
}
