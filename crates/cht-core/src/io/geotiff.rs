//! Single-band GeoTIFF reader on top of the `tiff` crate.
//!
//! Georeferencing comes from `ModelPixelScaleTag` (33550) and
//! `ModelTiepointTag` (33922); the sentinel from `GDAL_NODATA` (42113).
//! Rotated (`ModelTransformationTag`) files are not supported.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::warn;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::{Result, TerrainError};
use crate::raster::{Raster, DEFAULT_NODATA};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GDAL_NODATA: u16 = 42113;

pub fn read_geotiff(path: &Path) -> Result<Raster> {
    let file = File::open(path).map_err(|e| TerrainError::from_read(path, e))?;
    let tiff_err = |e: tiff::TiffError| TerrainError::format(path, e.to_string());

    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_err)?;
    let (w, h) = decoder.dimensions().map_err(tiff_err)?;
    let (width, height) = (w as usize, h as usize);

    let scale = decoder
        .find_tag(Tag::Unknown(MODEL_PIXEL_SCALE))
        .map_err(tiff_err)?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(tiff_err)?;
    let tiepoint = decoder
        .find_tag(Tag::Unknown(MODEL_TIEPOINT))
        .map_err(tiff_err)?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(tiff_err)?;
    let nodata = decoder
        .find_tag(Tag::Unknown(GDAL_NODATA))
        .map_err(tiff_err)?
        .and_then(|v| v.into_string().ok())
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f32>().ok())
        .unwrap_or(DEFAULT_NODATA);

    let (xllcorner, yllcorner, cellsize) = match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            let (sx, sy) = (s[0], s[1]);
            if sx <= 0.0 || (sx - sy).abs() > 1e-6 * sx {
                return Err(TerrainError::format(path, format!("non-square pixels {sx} x {sy}")));
            }
            let x_ul = t[3] - t[0] * sx;
            let y_ul = t[4] + t[1] * sy;
            (x_ul, y_ul - height as f64 * sy, sx)
        }
        _ => {
            warn!("{} has no GeoTIFF georeferencing; assuming unit cells", path.display());
            (0.0, 0.0, 1.0)
        }
    };

    let data: Vec<f32> = match decoder.read_image().map_err(tiff_err)? {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        _ => return Err(TerrainError::format(path, "unsupported sample type")),
    };
    if data.len() != width * height {
        return Err(TerrainError::format(
            path,
            format!("{} samples for {width}x{height}; only single-band images are supported", data.len()),
        ));
    }

    Ok(Raster { data, width, height, xllcorner, yllcorner, cellsize, nodata })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = read_geotiff(Path::new("/nonexistent/dir/none.tif")).unwrap_err();
        assert!(matches!(err, TerrainError::NotFound { .. }));
    }

    #[test]
    fn garbage_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.tif");
        std::fs::write(&path, b"not a tiff at all").unwrap();
        assert!(matches!(read_geotiff(&path), Err(TerrainError::Format { .. })));
    }
}
