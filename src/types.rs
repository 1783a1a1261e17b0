use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scene classification code (Sentinel-2 SCL values are 0-11)
pub type ClassCode = u8;

/// 2D array of classification codes (rows x cols)
pub type CodeArray = Array2<ClassCode>;

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build a north-up transform from an upper-left corner and pixel size
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    /// Build from a GDAL-ordered coefficient array
    pub fn from_gdal(coefficients: [f64; 6]) -> Self {
        Self {
            top_left_x: coefficients[0],
            pixel_width: coefficients[1],
            rotation_x: coefficients[2],
            top_left_y: coefficients[3],
            rotation_y: coefficients[4],
            pixel_height: coefficients[5],
        }
    }
}

/// Where a classification grid sits on the ground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    /// Human-readable CRS name, e.g. "WGS84 / UTM zone 32N"
    pub crs_name: Option<String>,
    /// EPSG code of the CRS, if known
    pub epsg: Option<u32>,
    pub geo_transform: Option<GeoTransform>,
    /// (x, y) pixel size in CRS units
    pub pixel_size: (f64, f64),
    /// Nominal band resolution in metres
    pub resolution_m: u32,
    /// Product-relative path of the band the grid was read from
    pub source: PathBuf,
}

/// Immutable grid of per-pixel classification codes
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationGrid {
    codes: CodeArray,
    georef: Option<GeoReference>,
}

impl ClassificationGrid {
    /// Create a grid from row-major codes
    pub fn new(width: usize, height: usize, codes: Vec<ClassCode>) -> SclResult<Self> {
        let codes = Array2::from_shape_vec((height, width), codes).map_err(|e| {
            SclError::InvalidGrid(format!("{}x{} grid: {}", width, height, e))
        })?;
        Ok(Self::from_array(codes))
    }

    /// Wrap an existing (rows, cols) array
    pub fn from_array(codes: CodeArray) -> Self {
        Self { codes, georef: None }
    }

    /// Build from nested rows, mostly useful for small hand-written grids
    pub fn from_rows<R: AsRef<[ClassCode]>>(rows: &[R]) -> SclResult<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut codes = Vec::with_capacity(width * height);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(SclError::InvalidGrid(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            codes.extend_from_slice(row);
        }
        Self::new(width, height, codes)
    }

    pub fn with_georeference(mut self, georef: GeoReference) -> Self {
        self.georef = Some(georef);
        self
    }

    pub fn width(&self) -> usize {
        self.codes.ncols()
    }

    pub fn height(&self) -> usize {
        self.codes.nrows()
    }

    /// Code at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> Option<ClassCode> {
        self.codes.get((y, x)).copied()
    }

    pub fn codes(&self) -> &CodeArray {
        &self.codes
    }

    pub fn georeference(&self) -> Option<&GeoReference> {
        self.georef.as_ref()
    }

    /// Iterate over `(x, y, code)` in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, ClassCode)> + '_ {
        self.codes
            .indexed_iter()
            .map(|((row, col), &code)| (col, row, code))
    }
}

/// Error types for classification map extraction and rendering
#[derive(Debug, thiserror::Error)]
pub enum SclError {
    #[error("Product not found: {path}: {reason}")]
    ProductNotFound { path: PathBuf, reason: String },

    #[error("Classification band missing in {product}: {detail}")]
    BandMissing { product: PathBuf, detail: String },

    #[error("Failed to decode {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Unknown class code {code} at pixel ({x}, {y})")]
    UnknownClassCode { code: ClassCode, x: usize, y: usize },

    #[error("Failed to write {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SclError {
    pub(crate) fn decode<P: Into<PathBuf>>(path: P, reason: impl ToString) -> Self {
        SclError::DecodeError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write<P: Into<PathBuf>>(path: P, reason: impl ToString) -> Self {
        SclError::WriteError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for classification map operations
pub type SclResult<T> = Result<T, SclError>;
