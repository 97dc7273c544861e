//! ENVI `.bil` rasters with `.hdr` sidecar.
//!
//! Only single-band files are accepted. `map info` supplies the
//! georeferencing: `{projection, ref_x, ref_y, easting, northing, dx, dy, ...}`
//! where `(ref_x, ref_y)` is the 1-based pixel location of the tie point.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::warn;

use super::{decode_f32, with_extension};
use crate::error::{Result, TerrainError};
use crate::raster::{Raster, DEFAULT_NODATA};

/// Parse `key = value` pairs; braced values may span several lines.
/// Keys are lower-cased and trimmed.
fn parse_envi_header(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let mut value = value.trim().to_string();
        if value.starts_with('{') {
            while !value.contains('}') {
                match lines.next() {
                    Some(more) => {
                        value.push(' ');
                        value.push_str(more.trim());
                    }
                    None => break,
                }
            }
        }
        out.insert(key.trim().to_ascii_lowercase(), value);
    }
    out
}

fn required<T: std::str::FromStr>(
    hdr: &HashMap<String, String>,
    key: &str,
    path: &Path,
) -> Result<T> {
    hdr.get(key)
        .ok_or_else(|| TerrainError::format(path, format!("missing `{key}`")))?
        .trim()
        .parse()
        .map_err(|_| TerrainError::format(path, format!("bad `{key}`")))
}

/// Bytes per sample and a decoder for the ENVI `data type` codes we accept.
fn decode_samples(bytes: &[u8], data_type: u32, big_endian: bool, path: &Path) -> Result<Vec<f32>> {
    let data = match data_type {
        1 => bytes.iter().map(|&b| b as f32).collect(),
        2 => bytes
            .chunks_exact(2)
            .map(|b| {
                let arr = [b[0], b[1]];
                (if big_endian { i16::from_be_bytes(arr) } else { i16::from_le_bytes(arr) }) as f32
            })
            .collect(),
        3 => bytes
            .chunks_exact(4)
            .map(|b| {
                let arr = [b[0], b[1], b[2], b[3]];
                (if big_endian { i32::from_be_bytes(arr) } else { i32::from_le_bytes(arr) }) as f32
            })
            .collect(),
        4 => decode_f32(bytes, big_endian),
        5 => bytes
            .chunks_exact(8)
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                (if big_endian { f64::from_be_bytes(arr) } else { f64::from_le_bytes(arr) }) as f32
            })
            .collect(),
        12 => bytes
            .chunks_exact(2)
            .map(|b| {
                let arr = [b[0], b[1]];
                (if big_endian { u16::from_be_bytes(arr) } else { u16::from_le_bytes(arr) }) as f32
            })
            .collect(),
        other => {
            return Err(TerrainError::format(path, format!("unsupported data type {other}")));
        }
    };
    Ok(data)
}

fn sample_size(data_type: u32) -> usize {
    match data_type {
        1 => 1,
        2 | 12 => 2,
        5 => 8,
        _ => 4,
    }
}

/// Read `<stem>.<ext>` (normally `bil`) using the georeferencing in `<stem>.hdr`.
pub fn read_bil(stem: &Path, ext: &str) -> Result<Raster> {
    let hdr_path = with_extension(stem, "hdr");
    let bil_path = with_extension(stem, ext);

    let text = fs::read_to_string(&hdr_path).map_err(|e| TerrainError::from_read(&hdr_path, e))?;
    let hdr = parse_envi_header(&text);

    let width: usize = required(&hdr, "samples", &hdr_path)?;
    let height: usize = required(&hdr, "lines", &hdr_path)?;
    let bands: usize = hdr.get("bands").and_then(|v| v.trim().parse().ok()).unwrap_or(1);
    if bands != 1 {
        return Err(TerrainError::format(&hdr_path, format!("{bands} bands, expected 1")));
    }
    let data_type: u32 = hdr.get("data type").and_then(|v| v.trim().parse().ok()).unwrap_or(4);
    let big_endian = hdr.get("byte order").map(|v| v.trim() == "1").unwrap_or(false);
    let offset: usize = hdr.get("header offset").and_then(|v| v.trim().parse().ok()).unwrap_or(0);
    let nodata: f32 = hdr
        .get("data ignore value")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_NODATA);

    let (xllcorner, yllcorner, cellsize) = match hdr.get("map info") {
        Some(info) => parse_map_info(info, height, &hdr_path)?,
        None => {
            warn!("{} has no map info; assuming unit cells at the origin", hdr_path.display());
            (0.0, 0.0, 1.0)
        }
    };

    let bytes = fs::read(&bil_path).map_err(|e| TerrainError::from_read(&bil_path, e))?;
    let need = offset + width * height * sample_size(data_type);
    if bytes.len() < need {
        return Err(TerrainError::format(
            &bil_path,
            format!("{} bytes, expected at least {need}", bytes.len()),
        ));
    }
    let data = decode_samples(&bytes[offset..need], data_type, big_endian, &bil_path)?;

    Ok(Raster { data, width, height, xllcorner, yllcorner, cellsize, nodata })
}

/// `(xllcorner, yllcorner, cellsize)` from an ENVI `map info` value.
fn parse_map_info(info: &str, height: usize, path: &Path) -> Result<(f64, f64, f64)> {
    let inner = info.trim().trim_start_matches('{').trim_end_matches('}');
    let fields: Vec<&str> = inner.split(',').map(str::trim).collect();
    if fields.len() < 7 {
        return Err(TerrainError::format(path, "map info has fewer than 7 fields"));
    }
    let num = |i: usize| -> Result<f64> {
        fields[i]
            .parse::<f64>()
            .map_err(|_| TerrainError::format(path, format!("map info field {i} is not numeric")))
    };
    let (ref_x, ref_y) = (num(1)?, num(2)?);
    let (easting, northing) = (num(3)?, num(4)?);
    let (dx, dy) = (num(5)?, num(6)?);
    if dx <= 0.0 || (dx - dy).abs() > 1e-6 * dx {
        return Err(TerrainError::format(path, format!("non-square cells {dx} x {dy}")));
    }
    let x_ul = easting - (ref_x - 1.0) * dx;
    let y_ul = northing + (ref_y - 1.0) * dy;
    Ok((x_ul, y_ul - height as f64 * dy, dx))
}

/// Write `<stem>.bil` (little-endian f32) and its `.hdr`.
pub fn write_bil(raster: &Raster, stem: &Path) -> Result<()> {
    let hdr_path = with_extension(stem, "hdr");
    let bil_path = with_extension(stem, "bil");

    let header = format!(
        "ENVI\n\
         description = {{cht-core raster}}\n\
         samples = {}\n\
         lines = {}\n\
         bands = 1\n\
         header offset = 0\n\
         file type = ENVI Standard\n\
         data type = 4\n\
         interleave = bil\n\
         byte order = 0\n\
         map info = {{Arbitrary, 1, 1, {}, {}, {}, {}, units=Meters}}\n\
         data ignore value = {}\n",
        raster.width,
        raster.height,
        raster.xllcorner,
        raster.y_top(),
        raster.cellsize,
        raster.cellsize,
        raster.nodata,
    );
    fs::write(&hdr_path, header).map_err(|e| TerrainError::from_write(&hdr_path, e))?;

    let bytes: Vec<u8> = raster.data.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(&bil_path, bytes).map_err(|e| TerrainError::from_write(&bil_path, e))
}
