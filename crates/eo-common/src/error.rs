//! Error types for product resolution and band loading.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{BandId, SensorType};

/// Result type alias using ProductError.
pub type ProductResult<T> = Result<T, ProductError>;

/// Primary error type for product operations.
#[derive(Debug, Error)]
pub enum ProductError {
    // === Resolution Errors ===
    #[error("Product not found: {0}")]
    ProductNotFound(PathBuf),

    #[error("Unrecognized product: {0}")]
    UnrecognizedProduct(PathBuf),

    #[error("Cannot read archive {path}: {message}")]
    ArchiveRead { path: PathBuf, message: String },

    #[error("Invalid product {path}: {message}")]
    InvalidProduct { path: PathBuf, message: String },

    #[error("Invalid format registry: {0}")]
    Registry(String),

    // === Planning Errors ===
    #[error("Band {band} ({category}) cannot be loaded from a {sensor} product")]
    InvalidBandCategory {
        band: BandId,
        category: String,
        sensor: SensorType,
    },

    #[error("Index {index} cannot be computed: missing {missing:?}")]
    IndexNotComputable { index: BandId, missing: Vec<BandId> },

    #[error("Band {band} is not available for product {product}")]
    BandNotAvailable { band: BandId, product: String },

    #[error("No elevation source configured, required for {bands:?}")]
    MissingElevationSource { bands: Vec<BandId> },

    #[error("No cloud mask provider configured, required for {bands:?}")]
    MissingCloudProvider { bands: Vec<BandId> },

    // === Raster Errors ===
    #[error("Raster I/O failed for {path}: {message}")]
    RasterIo { path: PathBuf, message: String },

    #[error("Cannot collocate {band}: {message}")]
    GridMismatch { band: BandId, message: String },

    // === Infrastructure Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProductError {
    /// Stable code naming the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ProductError::ProductNotFound(_) => "ProductNotFound",
            ProductError::UnrecognizedProduct(_) => "UnrecognizedProduct",
            ProductError::ArchiveRead { .. } => "ArchiveReadFailure",
            ProductError::InvalidProduct { .. } => "InvalidProduct",
            ProductError::Registry(_) => "Registry",
            ProductError::InvalidBandCategory { .. } => "InvalidBandCategory",
            ProductError::IndexNotComputable { .. } => "IndexNotComputable",
            ProductError::BandNotAvailable { .. } => "BandNotAvailable",
            ProductError::MissingElevationSource { .. } => "MissingElevationSource",
            ProductError::MissingCloudProvider { .. } => "MissingCloudProvider",
            ProductError::RasterIo { .. } => "RasterIOFailure",
            ProductError::GridMismatch { .. } => "GridMismatch",
            ProductError::InvalidConfig(_) => "InvalidConfig",
            ProductError::Io(_) => "Io",
        }
    }

    /// Whether the error was raised while validating a load request,
    /// before any raster I/O took place.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            ProductError::InvalidBandCategory { .. }
                | ProductError::IndexNotComputable { .. }
                | ProductError::BandNotAvailable { .. }
                | ProductError::MissingElevationSource { .. }
                | ProductError::MissingCloudProvider { .. }
        )
    }

    /// Create an InvalidProduct error.
    pub fn invalid_product(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::InvalidProduct {
            path: path.as_ref().to_path_buf(),
            message: msg.into(),
        }
    }

    /// Create an ArchiveRead error.
    pub fn archive_read(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::ArchiveRead {
            path: path.as_ref().to_path_buf(),
            message: msg.into(),
        }
    }

    /// Create a RasterIo error.
    pub fn raster_io(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::RasterIo {
            path: path.as_ref().to_path_buf(),
            message: msg.into(),
        }
    }
}

impl From<serde_json::Error> for ProductError {
    fn from(err: serde_json::Error) -> Self {
        ProductError::InvalidConfig(format!("JSON error: {}", err))
    }
}
