use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Real-valued band sample (backscatter in dB, index value, cluster id)
pub type BandValue = f32;

/// No-data marker stored in band arrays. Every non-finite value is treated as no-data.
pub const NO_DATA: BandValue = BandValue::NAN;

/// Whether a band sample carries data
#[inline]
pub fn is_valid(value: BandValue) -> bool {
    value.is_finite()
}

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl Polarization {
    /// Band name used by the radar collection for this polarization
    pub fn band_name(&self) -> &'static str {
        match self {
            Polarization::VV => "VV",
            Polarization::VH => "VH",
            Polarization::HV => "HV",
            Polarization::HH => "HH",
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.band_name())
    }
}

impl FromStr for Polarization {
    type Err = WaterMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(WaterMapError::Config(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Sentinel-1 acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionMode {
    IW, // Interferometric Wide swath
    EW, // Extra Wide swath
    SM, // StripMap
    WV, // Wave
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AcquisitionMode::IW => "IW",
            AcquisitionMode::EW => "EW",
            AcquisitionMode::SM => "SM",
            AcquisitionMode::WV => "WV",
        };
        write!(f, "{}", name)
    }
}

/// Axis-aligned bounding box in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            max_x: min_x.max(max_x),
            min_y: min_y.min(max_y),
            max_y: min_y.max(max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// North-up affine transform from pixel to map coordinates.
///
/// `x = origin_x + col * pixel_width`, `y = origin_y + row * pixel_height`.
/// `pixel_height` is negative for the usual top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional (row, col) position of a map coordinate
    pub fn map_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (y - self.origin_y) / self.pixel_height,
            (x - self.origin_x) / self.pixel_width,
        )
    }

    fn approx_eq(&self, other: &GeoTransform) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0);
        close(self.origin_x, other.origin_x)
            && close(self.origin_y, other.origin_y)
            && close(self.pixel_width, other.pixel_width)
            && close(self.pixel_height, other.pixel_height)
    }
}

/// Pixel grid every raster of a run is aligned to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    pub fn new(transform: GeoTransform, rows: usize, cols: usize) -> Self {
        Self {
            transform,
            rows,
            cols,
        }
    }

    /// Grid of square pixels covering `bounds`, anchored at its top-left corner
    pub fn covering(bounds: &BoundingBox, pixel_size: f64) -> WaterMapResult<Self> {
        if !(pixel_size > 0.0) {
            return Err(WaterMapError::Config(format!(
                "Pixel size must be positive, got {}",
                pixel_size
            )));
        }
        let cols = (bounds.width() / pixel_size).ceil().max(1.0) as usize;
        let rows = (bounds.height() / pixel_size).ceil().max(1.0) as usize;
        Ok(Self::new(
            GeoTransform::new(bounds.min_x, bounds.max_y, pixel_size, -pixel_size),
            rows,
            cols,
        ))
    }

    /// Array shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_center(row, col)
    }

    /// Pixel containing a map coordinate, if it falls on the grid
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (row, col) = self.transform.map_to_pixel(x, y);
        if !row.is_finite() || !col.is_finite() || row < 0.0 || col < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows && col < self.cols).then_some((row, col))
    }

    /// Map extent of the grid
    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        BoundingBox::new(
            t.origin_x,
            t.origin_y,
            t.origin_x + self.cols as f64 * t.pixel_width,
            t.origin_y + self.rows as f64 * t.pixel_height,
        )
    }

    /// Whether two grids are pixel-for-pixel identical
    pub fn aligned_with(&self, other: &GridSpec) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.transform.approx_eq(&other.transform)
    }
}

/// Temporal query range: `[center - half_width, center + half_width)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub center: NaiveDate,
    pub half_width_days: i64,
}

impl DateWindow {
    pub fn new(center: NaiveDate, half_width_days: i64) -> Self {
        Self {
            center,
            half_width_days,
        }
    }

    /// First day of the window (inclusive)
    pub fn start(&self) -> NaiveDate {
        self.center - Duration::days(self.half_width_days)
    }

    /// Day after the window (exclusive)
    pub fn end(&self) -> NaiveDate {
        self.center + Duration::days(self.half_width_days)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date < self.end()
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start(), self.end())
    }
}

/// Scalar property attached to scenes and features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
    TextList(Vec<String>),
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

/// Error types for water classification
#[derive(Debug, thiserror::Error)]
pub enum WaterMapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Insufficient training data: {available} samples for {required} clusters")]
    InsufficientTrainingData { available: usize, required: usize },

    #[error("Band alignment error: {0}")]
    BandAlignment(String),

    #[error("Reference vectorization covers {pixels} pixels, limit is {limit}")]
    OverPixelLimit { pixels: usize, limit: usize },

    #[error("No labelled pixels found inside the reference region")]
    NoReferenceSamples,
}

/// Result type for water classification operations
pub type WaterMapResult<T> = Result<T, WaterMapError>;
