//! Core types for band loading.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use eo_common::{BandId, GridSpec, ProductError, SensorType};
use serde::{Deserialize, Serialize};

/// A single materialized band: row-major `f32` data placed on a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterArray {
    /// Values in row-major order (top-to-bottom, left-to-right)
    pub data: Vec<f32>,
    pub grid: GridSpec,
    /// Value marking missing pixels, if the source defines one
    pub nodata: Option<f32>,
    /// Free-form attributes persisted with the array
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl RasterArray {
    pub fn new(data: Vec<f32>, grid: GridSpec) -> Self {
        Self {
            data,
            grid,
            nodata: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Same grid and attributes, new values.
    pub fn with_data(&self, data: Vec<f32>) -> Self {
        Self {
            data,
            grid: self.grid,
            nodata: self.nodata,
            attributes: self.attributes.clone(),
        }
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    /// Value at (col, row), `None` outside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.grid.width || row >= self.grid.height {
            return None;
        }
        self.data.get(row * self.grid.width + col).copied()
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Whether the value marks a missing pixel.
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Data length must match the grid.
    pub fn check_shape(&self, band: BandId) -> Result<(), ProductError> {
        if self.data.len() != self.grid.len() {
            return Err(ProductError::GridMismatch {
                band,
                message: format!(
                    "{} values for a {}x{} grid",
                    self.data.len(),
                    self.grid.width,
                    self.grid.height
                ),
            });
        }
        Ok(())
    }
}

/// Requested output sampling: a square pixel size in CRS units, or an
/// explicit output shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PixelSpec {
    PixelSize(f64),
    Size { width: usize, height: usize },
}

impl PixelSpec {
    /// Token used in artifact file names: `20.0` gives `20-00m`, an
    /// explicit shape gives `{width}x{height}`.
    pub fn token(&self) -> String {
        match self {
            PixelSpec::PixelSize(px) => format!("{:.2}m", px).replace('.', "-"),
            PixelSpec::Size { width, height } => format!("{}x{}", width, height),
        }
    }

    /// Pixel size, if the spec is one.
    pub fn pixel_size(&self) -> Option<f64> {
        match self {
            PixelSpec::PixelSize(px) => Some(*px),
            PixelSpec::Size { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            PixelSpec::PixelSize(px) if !px.is_finite() || *px <= 0.0 => {
                Err(format!("pixel size must be > 0, got {}", px))
            }
            PixelSpec::Size { width, height } if *width == 0 || *height == 0 => {
                Err(format!("output size must be non-empty, got {}x{}", width, height))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PixelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Resampling method used for reads, warps and collocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingMethod {
    /// Nearest neighbor (preserves exact values, use for masks).
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Bilinear,
    /// Catmull-Rom bicubic interpolation.
    Cubic,
}

impl FromStr for ResamplingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nearest" | "near" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(format!("unknown resampling method: {}", other)),
        }
    }
}

impl fmt::Display for ResamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Cubic => write!(f, "cubic"),
        }
    }
}

/// How raw pixels are cleaned after a read and before any computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningPolicy {
    /// Values untouched.
    Raw,
    /// Nodata pixels become NaN.
    NodataOnly,
    /// Nodata and non-finite pixels become NaN, as do negative
    /// reflectances on optical products.
    #[default]
    Clean,
}

impl CleaningPolicy {
    /// Suffix appended to cache keys of cleaned bands. The default policy
    /// has none so that keys stay compatible with pre-seeded caches.
    pub fn key_suffix(&self) -> Option<&'static str> {
        match self {
            CleaningPolicy::Raw => Some("RAW"),
            CleaningPolicy::NodataOnly => Some("NODATA"),
            CleaningPolicy::Clean => None,
        }
    }

    /// Clean a freshly read raw band in place.
    pub fn apply(&self, array: &mut RasterArray, sensor: SensorType) {
        let nodata = array.nodata;
        let is_nodata = |v: f32| v.is_nan() || nodata.is_some_and(|nd| v == nd);

        match self {
            CleaningPolicy::Raw => {}
            CleaningPolicy::NodataOnly => {
                for v in array.data.iter_mut().filter(|v| is_nodata(**v)) {
                    *v = f32::NAN;
                }
            }
            CleaningPolicy::Clean => {
                let optical = sensor == SensorType::Optical;
                for v in array.data.iter_mut() {
                    if is_nodata(*v) || !v.is_finite() || (optical && *v < 0.0) {
                        *v = f32::NAN;
                    }
                }
            }
        }
    }
}

impl FromStr for CleaningPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "raw" => Ok(Self::Raw),
            "nodata" | "nodata_only" => Ok(Self::NodataOnly),
            "clean" => Ok(Self::Clean),
            other => Err(format!("unknown cleaning policy: {}", other)),
        }
    }
}

impl fmt::Display for CleaningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::NodataOnly => write!(f, "nodata_only"),
            Self::Clean => write!(f, "clean"),
        }
    }
}

/// Unit of the SLOPE band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlopeUnits {
    #[default]
    Degrees,
    Percent,
}

/// Bands returned by one load, in the caller's requested order.
#[derive(Debug, Clone, Default)]
pub struct BandCollection {
    bands: Vec<(BandId, RasterArray)>,
}

impl BandCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, band: BandId, array: RasterArray) {
        self.bands.push((band, array));
    }

    pub fn get(&self, band: BandId) -> Option<&RasterArray> {
        self.bands.iter().find(|(b, _)| *b == band).map(|(_, a)| a)
    }

    /// Band ids in iteration order.
    pub fn bands(&self) -> Vec<BandId> {
        self.bands.iter().map(|(b, _)| *b).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BandId, &RasterArray)> {
        self.bands.iter().map(|(b, a)| (*b, a))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

impl IntoIterator for BandCollection {
    type Item = (BandId, RasterArray);
    type IntoIter = std::vec::IntoIter<(BandId, RasterArray)>;

    fn into_iter(self) -> Self::IntoIter {
        self.bands.into_iter()
    }
}
