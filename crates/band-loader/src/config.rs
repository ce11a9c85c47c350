//! Configuration for band loading.
//!
//! A [`LoadConfig`] is built once (defaults, environment or YAML) and
//! handed to the loader; nothing reads the environment mid-load. Per-call
//! [`LoadOptions`] override it: call-site option > config value > default.

use std::path::{Path, PathBuf};

use eo_common::{BoundingBox, ProductError, ProductResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{CleaningPolicy, PixelSpec, ResamplingMethod, SlopeUnits};

/// Elevation raster used to derive DEM, SLOPE and HILLSHADE.
///
/// Either a local path or a URL understood by the raster service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElevationSource {
    location: String,
}

impl ElevationSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_remote(&self) -> bool {
        self.location.contains("://")
    }

    /// Local path of the source (meaningless for remote sources).
    pub fn as_path(&self) -> &Path {
        Path::new(&self.location)
    }

    /// File name without extension, embedded in terrain artifact names.
    ///
    /// `/data/COPDEM_30m.vrt` gives `COPDEM_30m`.
    pub fn stem(&self) -> String {
        let file_name = self
            .location
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.location);
        let stem = match file_name.rfind('.') {
            Some(dot) if dot > 0 => &file_name[..dot],
            _ => file_name,
        };
        stem.replace('.', "-")
    }
}

impl From<PathBuf> for ElevationSource {
    fn from(path: PathBuf) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }
}

impl From<&str> for ElevationSource {
    fn from(location: &str) -> Self {
        Self::new(location)
    }
}

/// Hillshade illumination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillshadeParams {
    /// Sun azimuth in degrees clockwise from north
    pub azimuth: f64,
    /// Sun altitude in degrees above the horizon
    pub altitude: f64,
    /// Vertical exaggeration
    pub z_factor: f64,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            azimuth: 315.0,
            altitude: 45.0,
            z_factor: 1.0,
        }
    }
}

/// Compression codec for cached artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd.
    #[default]
    BloscZstd,
}

impl ArtifactCompression {
    /// Parse from string (case-insensitive), falling back to Blosc Zstd.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ArtifactCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How cached artifacts are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactOptions {
    /// Square chunk dimension of the Zarr array.
    pub chunk_size: usize,
    pub compression: ArtifactCompression,
    /// Compression level (1-9).
    pub compression_level: u8,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            compression: ArtifactCompression::BloscZstd,
            compression_level: 1,
        }
    }
}

/// Configuration for the band loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Elevation raster for DEM-family bands.
    pub elevation_source: Option<ElevationSource>,

    /// Resampling used for reads, DEM warps and collocation.
    pub resampling: ResamplingMethod,

    /// Cleaning applied to raw bands.
    pub cleaning: CleaningPolicy,

    /// Read-only directory checked for artifacts before the product's
    /// output directory.
    pub cache_override_dir: Option<PathBuf>,

    pub hillshade: HillshadeParams,

    pub slope_units: SlopeUnits,

    pub artifacts: ArtifactOptions,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            elevation_source: None,
            resampling: ResamplingMethod::Bilinear,
            cleaning: CleaningPolicy::Clean,
            cache_override_dir: None,
            hillshade: HillshadeParams::default(),
            slope_units: SlopeUnits::Degrees,
            artifacts: ArtifactOptions::default(),
        }
    }
}

impl LoadConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("EO_DEM_PATH") {
            if !val.trim().is_empty() {
                config.elevation_source = Some(ElevationSource::new(val.trim()));
            }
        }

        if let Ok(val) = std::env::var("EO_RESAMPLING") {
            match val.parse() {
                Ok(method) => config.resampling = method,
                Err(e) => warn!(value = %val, error = %e, "Ignoring EO_RESAMPLING"),
            }
        }

        if let Ok(val) = std::env::var("EO_CLEANING") {
            match val.parse() {
                Ok(policy) => config.cleaning = policy,
                Err(e) => warn!(value = %val, error = %e, "Ignoring EO_CLEANING"),
            }
        }

        if let Ok(val) = std::env::var("EO_CACHE_OVERRIDE_DIR") {
            if !val.trim().is_empty() {
                config.cache_override_dir = Some(PathBuf::from(val.trim()));
            }
        }

        if let Ok(val) = std::env::var("EO_HILLSHADE_AZIMUTH") {
            if let Ok(azimuth) = val.parse() {
                config.hillshade.azimuth = azimuth;
            }
        }

        if let Ok(val) = std::env::var("EO_HILLSHADE_ALTITUDE") {
            if let Ok(altitude) = val.parse() {
                config.hillshade.altitude = altitude;
            }
        }

        if let Ok(val) = std::env::var("EO_ZARR_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.artifacts.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("EO_ZARR_COMPRESSION") {
            config.artifacts.compression = ArtifactCompression::from_str(&val);
        }

        config
    }

    /// Load configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ProductResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
            .map_err(|e| ProductError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=360.0).contains(&self.hillshade.azimuth) {
            return Err("hillshade azimuth must be within 0-360".to_string());
        }

        if !(0.0..=90.0).contains(&self.hillshade.altitude) {
            return Err("hillshade altitude must be within 0-90".to_string());
        }

        if !self.hillshade.z_factor.is_finite() || self.hillshade.z_factor <= 0.0 {
            return Err("hillshade z_factor must be > 0".to_string());
        }

        if self.artifacts.chunk_size == 0 {
            return Err("artifact chunk_size must be > 0".to_string());
        }

        if self.artifacts.compression_level == 0 || self.artifacts.compression_level > 9 {
            return Err("artifact compression_level must be 1-9".to_string());
        }

        if let Some(source) = &self.elevation_source {
            if source.location().trim().is_empty() {
                return Err("elevation_source must not be empty".to_string());
            }
        }

        Ok(())
    }
}

/// Per-call overrides for one load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Output sampling; the product's default pixel size when unset
    pub pixel: Option<PixelSpec>,
    pub resampling: Option<ResamplingMethod>,
    pub cleaning: Option<CleaningPolicy>,
    pub elevation_source: Option<ElevationSource>,
    /// Restrict raw reads to a window in the product CRS
    pub window: Option<BoundingBox>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixel_size(mut self, pixel_size: f64) -> Self {
        self.pixel = Some(PixelSpec::PixelSize(pixel_size));
        self
    }

    pub fn size(mut self, width: usize, height: usize) -> Self {
        self.pixel = Some(PixelSpec::Size { width, height });
        self
    }

    pub fn resampling(mut self, method: ResamplingMethod) -> Self {
        self.resampling = Some(method);
        self
    }

    pub fn cleaning(mut self, policy: CleaningPolicy) -> Self {
        self.cleaning = Some(policy);
        self
    }

    pub fn elevation_source(mut self, source: impl Into<ElevationSource>) -> Self {
        self.elevation_source = Some(source.into());
        self
    }

    pub fn window(mut self, window: BoundingBox) -> Self {
        self.window = Some(window);
        self
    }
}

/// Options of one load after precedence has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub pixel: PixelSpec,
    pub resampling: ResamplingMethod,
    pub cleaning: CleaningPolicy,
    pub elevation_source: Option<ElevationSource>,
    pub window: Option<BoundingBox>,
}

impl ResolvedOptions {
    /// Merge call-site options over the config, falling back to the
    /// product's native pixel size.
    pub fn resolve(
        options: &LoadOptions,
        config: &LoadConfig,
        default_pixel_size: f64,
    ) -> ProductResult<Self> {
        let pixel = options
            .pixel
            .unwrap_or(PixelSpec::PixelSize(default_pixel_size));
        pixel.validate().map_err(ProductError::InvalidConfig)?;
        if let Some(window) = &options.window {
            if !window.is_valid() {
                return Err(ProductError::InvalidConfig(format!(
                    "Load window has no area: {:?}",
                    window
                )));
            }
        }

        Ok(Self {
            pixel,
            resampling: options.resampling.unwrap_or(config.resampling),
            cleaning: options.cleaning.unwrap_or(config.cleaning),
            elevation_source: options
                .elevation_source
                .clone()
                .or_else(|| config.elevation_source.clone()),
            window: options.window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoadConfig::default();
        assert_eq!(config.resampling, ResamplingMethod::Bilinear);
        assert_eq!(config.cleaning, CleaningPolicy::Clean);
        assert_eq!(config.hillshade.azimuth, 315.0);
        assert_eq!(config.hillshade.altitude, 45.0);
        assert_eq!(config.hillshade.z_factor, 1.0);
        assert_eq!(config.slope_units, SlopeUnits::Degrees);
        assert!(config.elevation_source.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoadConfig::default();
        config.hillshade.altitude = 95.0;
        assert!(config.validate().is_err());

        config = LoadConfig::default();
        config.hillshade.azimuth = -1.0;
        assert!(config.validate().is_err());

        config = LoadConfig::default();
        config.artifacts.compression_level = 10;
        assert!(config.validate().is_err());

        config = LoadConfig::default();
        config.elevation_source = Some(ElevationSource::new(" "));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_config() {
        let config = LoadConfig::from_yaml_str(
            "elevation_source: /data/dem/COPDEM_30m.vrt\nresampling: nearest\ncleaning: nodata_only\nhillshade:\n  azimuth: 270\n",
        )
        .unwrap();
        assert_eq!(config.elevation_source.unwrap().location(), "/data/dem/COPDEM_30m.vrt");
        assert_eq!(config.resampling, ResamplingMethod::Nearest);
        assert_eq!(config.cleaning, CleaningPolicy::NodataOnly);
        assert_eq!(config.hillshade.azimuth, 270.0);
        // Unset keys keep their defaults
        assert_eq!(config.hillshade.altitude, 45.0);
        assert_eq!(config.artifacts.chunk_size, 512);
    }

    #[test]
    fn test_yaml_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("load.yaml");
        std::fs::write(&path, "resampling: lanczos\n").unwrap();
        let err = LoadConfig::from_yaml_file(&path).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");

        let err = LoadConfig::from_yaml_file(dir.path().join("missing.yaml")).unwrap_err();
        assert_eq!(err.kind(), "Io");
    }

    #[test]
    fn test_elevation_stem() {
        assert_eq!(ElevationSource::new("/data/dem/COPDEM_30m.vrt").stem(), "COPDEM_30m");
        assert_eq!(ElevationSource::new("https://dem.example.org/srtm.v3.tif").stem(), "srtm-v3");
        assert_eq!(ElevationSource::new("dem").stem(), "dem");
        assert!(ElevationSource::new("s3://bucket/dem.tif").is_remote());
    }

    #[test]
    fn test_option_precedence() {
        let mut config = LoadConfig::default();
        config.resampling = ResamplingMethod::Nearest;
        config.elevation_source = Some(ElevationSource::new("/config/dem.tif"));

        let resolved = ResolvedOptions::resolve(&LoadOptions::new(), &config, 30.0).unwrap();
        assert_eq!(resolved.pixel, PixelSpec::PixelSize(30.0));
        assert_eq!(resolved.resampling, ResamplingMethod::Nearest);
        assert_eq!(resolved.cleaning, CleaningPolicy::Clean);
        assert_eq!(resolved.elevation_source.unwrap().location(), "/config/dem.tif");

        let options = LoadOptions::new()
            .pixel_size(20.0)
            .resampling(ResamplingMethod::Cubic)
            .elevation_source("/call/dem.tif");
        let resolved = ResolvedOptions::resolve(&options, &config, 30.0).unwrap();
        assert_eq!(resolved.pixel, PixelSpec::PixelSize(20.0));
        assert_eq!(resolved.resampling, ResamplingMethod::Cubic);
        assert_eq!(resolved.elevation_source.unwrap().location(), "/call/dem.tif");
    }

    #[test]
    fn test_invalid_pixel_option() {
        let err = ResolvedOptions::resolve(&LoadOptions::new().pixel_size(-5.0), &LoadConfig::default(), 10.0)
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");

        let flat = LoadOptions::new().window(BoundingBox::new(10.0, 0.0, 10.0, 50.0));
        let err = ResolvedOptions::resolve(&flat, &LoadConfig::default(), 10.0).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");
    }

    #[test]
    fn test_artifact_compression_from_str() {
        assert_eq!(ArtifactCompression::from_str("none"), ArtifactCompression::None);
        assert_eq!(ArtifactCompression::from_str("LZ4"), ArtifactCompression::BloscLz4);
        assert_eq!(ArtifactCompression::from_str("whatever"), ArtifactCompression::BloscZstd);
    }
}
