use crate::error::{Result, TerrainError};

/// No-data sentinel used when a file does not declare one.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// A georeferenced 2D grid of f32 cells, row-major.
/// Row 0 is the northern edge; `(xllcorner, yllcorner)` is the south-west
/// corner of the grid in map units.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Row-major cell values.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    /// Square cell size in map units.
    pub cellsize: f64,
    pub nodata: f32,
}

impl Raster {
    /// Create a new Raster filled with the given value.
    pub fn new(
        width: usize,
        height: usize,
        xllcorner: f64,
        yllcorner: f64,
        cellsize: f64,
        nodata: f32,
        fill: f32,
    ) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            xllcorner,
            yllcorner,
            cellsize,
            nodata,
        }
    }

    /// Unit-cell raster anchored at the origin, every cell set to `fill`.
    pub fn flat(width: usize, height: usize, fill: f32) -> Self {
        Self::new(width, height, 0.0, 0.0, 1.0, DEFAULT_NODATA, fill)
    }

    /// Wrap existing row-major data. Fails when `data.len() != width * height`.
    pub fn from_data(
        data: Vec<f32>,
        width: usize,
        height: usize,
        cellsize: f64,
        nodata: f32,
    ) -> Result<Self> {
        if data.len() != width * height {
            return Err(TerrainError::InvalidParameter {
                name: "data",
                value: data.len().to_string(),
                reason: format!("expected {width}x{height} = {} cells", width * height),
            });
        }
        Ok(Self { data, width, height, xllcorner: 0.0, yllcorner: 0.0, cellsize, nodata })
    }

    /// A raster on the same grid as `self` with every cell set to `fill`.
    pub fn like(&self, fill: f32) -> Self {
        Self::new(
            self.width,
            self.height,
            self.xllcorner,
            self.yllcorner,
            self.cellsize,
            self.nodata,
            fill,
        )
    }

    /// A raster on the same grid as `self` with every cell no-data.
    pub fn empty_like(&self) -> Self {
        self.like(self.nodata)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn row_col(&self, idx: usize) -> (usize, usize) {
        (idx / self.width, idx % self.width)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// True for the sentinel and for non-finite values.
    #[inline]
    pub fn is_nodata(&self, v: f32) -> bool {
        v == self.nodata || !v.is_finite()
    }

    #[inline]
    pub fn is_valid_at(&self, idx: usize) -> bool {
        !self.is_nodata(self.data[idx])
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Northern edge of the grid in map units.
    pub fn y_top(&self) -> f64 {
        self.yllcorner + self.height as f64 * self.cellsize
    }

    /// Map coordinates of the centre of `(row, col)`.
    pub fn cell_centre(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.xllcorner + (col as f64 + 0.5) * self.cellsize;
        let y = self.y_top() - (row as f64 + 0.5) * self.cellsize;
        (x, y)
    }

    /// Cell containing map point `(x, y)`, or None outside the grid.
    pub fn row_col_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let fc = (x - self.xllcorner) / self.cellsize;
        let fr = (self.y_top() - y) / self.cellsize;
        if !fc.is_finite() || !fr.is_finite() || fc < 0.0 || fr < 0.0 {
            return None;
        }
        let (row, col) = (fr.floor() as usize, fc.floor() as usize);
        (row < self.height && col < self.width).then_some((row, col))
    }

    /// Same dimensions, origin and cell size.
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.cellsize - other.cellsize).abs() <= 1e-9 * self.cellsize.abs().max(1.0)
            && (self.xllcorner - other.xllcorner).abs() <= 1e-6 * self.cellsize.abs().max(1.0)
            && (self.yllcorner - other.yllcorner).abs() <= 1e-6 * self.cellsize.abs().max(1.0)
    }

    /// Error unless `other` shares this raster's grid.
    pub fn check_same_grid(&self, other: &Raster) -> Result<()> {
        if self.same_grid(other) {
            Ok(())
        } else {
            Err(TerrainError::GridMismatch {
                expected: self.describe_grid(),
                found: other.describe_grid(),
            })
        }
    }

    fn describe_grid(&self) -> String {
        format!(
            "{}x{} @ {} from ({}, {})",
            self.width, self.height, self.cellsize, self.xllcorner, self.yllcorner
        )
    }

    /// Smallest valid cell value, or None when every cell is no-data.
    pub fn min_value(&self) -> Option<f32> {
        self.data.iter().copied().filter(|&v| !self.is_nodata(v)).reduce(f32::min)
    }

    /// Largest valid cell value, or None when every cell is no-data.
    pub fn max_value(&self) -> Option<f32> {
        self.data.iter().copied().filter(|&v| !self.is_nodata(v)).reduce(f32::max)
    }
}
