//! ESRI ASCII grids (`.asc`) and float grids (`.flt` + `.hdr`).
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::{decode_f32, with_extension};
use crate::error::{Result, TerrainError};
use crate::raster::{Raster, DEFAULT_NODATA};

const HEADER_KEYS: [&str; 9] = [
    "ncols",
    "nrows",
    "xllcorner",
    "yllcorner",
    "xllcenter",
    "yllcenter",
    "cellsize",
    "nodata_value",
    "byteorder",
];

struct GridHeader {
    ncols: usize,
    nrows: usize,
    xllcorner: f64,
    yllcorner: f64,
    cellsize: f64,
    nodata: f32,
    big_endian: bool,
}

impl GridHeader {
    fn from_pairs(pairs: &HashMap<String, String>, path: &Path) -> Result<Self> {
        let get = |key: &str| -> Result<f64> {
            pairs
                .get(key)
                .ok_or_else(|| TerrainError::format(path, format!("missing `{key}`")))?
                .parse::<f64>()
                .map_err(|_| TerrainError::format(path, format!("bad `{key}`")))
        };
        let ncols = get("ncols")? as usize;
        let nrows = get("nrows")? as usize;
        let cellsize = get("cellsize")?;
        if cellsize <= 0.0 {
            return Err(TerrainError::format(path, "cellsize must be positive"));
        }
        let xllcorner = match get("xllcorner") {
            Ok(v) => v,
            Err(_) => get("xllcenter")? - cellsize / 2.0,
        };
        let yllcorner = match get("yllcorner") {
            Ok(v) => v,
            Err(_) => get("yllcenter")? - cellsize / 2.0,
        };
        let nodata = get("nodata_value").map(|v| v as f32).unwrap_or(DEFAULT_NODATA);
        let big_endian = pairs
            .get("byteorder")
            .map(|v| v.eq_ignore_ascii_case("msbfirst"))
            .unwrap_or(false);
        Ok(Self { ncols, nrows, xllcorner, yllcorner, cellsize, nodata, big_endian })
    }

    fn into_raster(self, data: Vec<f32>) -> Raster {
        Raster {
            data,
            width: self.ncols,
            height: self.nrows,
            xllcorner: self.xllcorner,
            yllcorner: self.yllcorner,
            cellsize: self.cellsize,
            nodata: self.nodata,
        }
    }
}

/// Read an ESRI ASCII grid.
pub fn read_asc(path: &Path) -> Result<Raster> {
    let text = fs::read_to_string(path).map_err(|e| TerrainError::from_read(path, e))?;

    let mut pairs = HashMap::new();
    let mut header_lines = 0usize;
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let key = match tokens.next() {
            Some(k) => k.to_ascii_lowercase(),
            None => {
                header_lines += 1;
                continue;
            }
        };
        if !HEADER_KEYS.contains(&key.as_str()) {
            break;
        }
        let value = tokens
            .next()
            .ok_or_else(|| TerrainError::format(path, format!("`{key}` has no value")))?;
        pairs.insert(key, value.to_string());
        header_lines += 1;
    }
    let header = GridHeader::from_pairs(&pairs, path)?;

    let data = text
        .lines()
        .skip(header_lines)
        .flat_map(str::split_whitespace)
        .map(|t| t.parse::<f32>())
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| TerrainError::format(path, format!("bad cell value: {e}")))?;
    let expected = header.ncols * header.nrows;
    if data.len() != expected {
        return Err(TerrainError::format(
            path,
            format!("{} cell values, expected {expected}", data.len()),
        ));
    }
    Ok(header.into_raster(data))
}

/// Write an ESRI ASCII grid.
pub fn write_asc(raster: &Raster, path: &Path) -> Result<()> {
    let mut out = String::with_capacity(raster.len() * 10 + 128);
    let _ = writeln!(out, "ncols {}", raster.width);
    let _ = writeln!(out, "nrows {}", raster.height);
    let _ = writeln!(out, "xllcorner {}", raster.xllcorner);
    let _ = writeln!(out, "yllcorner {}", raster.yllcorner);
    let _ = writeln!(out, "cellsize {}", raster.cellsize);
    let _ = writeln!(out, "NODATA_value {}", raster.nodata);
    for row in raster.data.chunks(raster.width.max(1)) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    fs::write(path, out).map_err(|e| TerrainError::from_write(path, e))
}

/// Read `<stem>.<ext>` (normally `flt`) using the ESRI header in `<stem>.hdr`.
pub fn read_flt(stem: &Path, ext: &str) -> Result<Raster> {
    let hdr_path = with_extension(stem, "hdr");
    let flt_path = with_extension(stem, ext);

    let text = fs::read_to_string(&hdr_path).map_err(|e| TerrainError::from_read(&hdr_path, e))?;
    let pairs: HashMap<String, String> = text
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            Some((tokens.next()?.to_ascii_lowercase(), tokens.next()?.to_string()))
        })
        .collect();
    let header = GridHeader::from_pairs(&pairs, &hdr_path)?;

    let bytes = fs::read(&flt_path).map_err(|e| TerrainError::from_read(&flt_path, e))?;
    let expected = header.ncols * header.nrows;
    if bytes.len() < expected * 4 {
        return Err(TerrainError::format(
            &flt_path,
            format!("{} bytes, expected {}", bytes.len(), expected * 4),
        ));
    }
    let data = decode_f32(&bytes[..expected * 4], header.big_endian);
    Ok(header.into_raster(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asc_with_cell_centre_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.asc");
        fs::write(
            &path,
            "ncols 2\nnrows 2\nxllcenter 1.0\nyllcenter 1.0\ncellsize 2\nNODATA_value -1\n1 2\n3 -1\n",
        )
        .unwrap();
        let r = read_asc(&path).unwrap();
        assert_eq!((r.xllcorner, r.yllcorner), (0.0, 0.0));
        assert_eq!(r.nodata, -1.0);
        assert_eq!(r.valid_count(), 3);
        assert_eq!(r.get(1, 0), 3.0);
    }

    #[test]
    fn asc_cell_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.asc");
        fs::write(&path, "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n").unwrap();
        assert!(matches!(read_asc(&path), Err(TerrainError::Format { .. })));
    }

    #[test]
    fn flt_big_endian() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("f");
        fs::write(
            with_extension(&stem, "hdr"),
            "ncols 2\nnrows 1\nxllcorner 10\nyllcorner 20\ncellsize 0.5\nNODATA_value -9999\nbyteorder MSBFIRST\n",
        )
        .unwrap();
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_be_bytes()).collect();
        fs::write(with_extension(&stem, "flt"), bytes).unwrap();
        let r = read_flt(&stem, "flt").unwrap();
        assert_eq!(r.data, vec![1.5, -2.0]);
        assert_eq!(r.cellsize, 0.5);
        assert_eq!(r.yllcorner, 20.0);
    }
}
