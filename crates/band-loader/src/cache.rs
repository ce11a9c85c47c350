//! Artifact cache: parameter-derived keys and path resolution.
//!
//! Keys bake in every parameter that changes an artifact's content, so a
//! file found under a key is trusted without re-validation. Artifact names
//! follow `{condensed_name}_{BAND}_{pixel}.zarr` for bands computed at a
//! pixel spec and `{condensed_name}_{BAND}_{elevation_stem}.zarr` for
//! DEM-family bands. Reads restricted to a window carry a
//! `_W{minx}_{miny}_{maxx}_{maxy}` token before the cleaning suffix.

use std::fmt;
use std::path::{Path, PathBuf};

use eo_common::{BandCategory, BandId, BoundingBox, ProductResult};
use tracing::debug;

use crate::config::{ElevationSource, ResolvedOptions};
use crate::types::{CleaningPolicy, PixelSpec};

/// Extension of persisted artifacts.
pub const ARTIFACT_EXTENSION: &str = "zarr";

/// Deterministic identifier of one cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    band: BandId,
    stem: String,
}

impl CacheKey {
    /// Key of a raw band or index computed over the whole product at
    /// `pixel` with `cleaning`.
    pub fn pixel(condensed_name: &str, band: BandId, pixel: &PixelSpec, cleaning: CleaningPolicy) -> Self {
        Self::windowed(condensed_name, band, pixel, None, cleaning)
    }

    /// Key of a raw band or index computed at `pixel`, restricted to
    /// `window` when one is set.
    pub fn windowed(
        condensed_name: &str,
        band: BandId,
        pixel: &PixelSpec,
        window: Option<&BoundingBox>,
        cleaning: CleaningPolicy,
    ) -> Self {
        let mut stem = format!("{}_{}_{}", condensed_name, band, pixel.token());
        if let Some(window) = window {
            stem.push('_');
            stem.push_str(&window_token(window));
        }
        if let Some(suffix) = cleaning.key_suffix() {
            stem.push('_');
            stem.push_str(suffix);
        }
        Self { band, stem }
    }

    /// Key of a DEM-family band derived from `elevation`.
    pub fn elevation(condensed_name: &str, band: BandId, elevation: &ElevationSource) -> Self {
        Self {
            band,
            stem: format!("{}_{}_{}", condensed_name, band, elevation.stem()),
        }
    }

    /// Key `band` is cached under for a load with `options`.
    ///
    /// `None` for cloud bands, which are never cached, and for DEM-family
    /// bands when no elevation source is set.
    pub fn for_band(condensed_name: &str, band: BandId, options: &ResolvedOptions) -> Option<Self> {
        match band.category() {
            BandCategory::Spectral | BandCategory::Radar | BandCategory::Index => {
                Some(Self::windowed(
                    condensed_name,
                    band,
                    &options.pixel,
                    options.window.as_ref(),
                    options.cleaning,
                ))
            }
            BandCategory::Dem => options
                .elevation_source
                .as_ref()
                .map(|source| Self::elevation(condensed_name, band, source)),
            BandCategory::Cloud => None,
        }
    }

    pub fn band(&self) -> BandId {
        self.band
    }

    /// File name of the artifact.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem, ARTIFACT_EXTENSION)
    }
}

/// `W{minx}_{miny}_{maxx}_{maxy}` with centimetre precision, `.` written
/// as `-` like pixel tokens.
fn window_token(window: &BoundingBox) -> String {
    let corner = |v: f64| format!("{:.2}", v).replace('.', "-");
    format!(
        "W{}_{}_{}_{}",
        corner(window.min_x),
        corner(window.min_y),
        corner(window.max_x),
        corner(window.max_y)
    )
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stem)
    }
}

/// Resolves cache keys to artifact paths.
///
/// The override directory is never written to.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    write_dir: PathBuf,
    override_dir: Option<PathBuf>,
}

impl ArtifactCache {
    pub fn new(write_dir: impl Into<PathBuf>, override_dir: Option<PathBuf>) -> Self {
        Self {
            write_dir: write_dir.into(),
            override_dir,
        }
    }

    pub fn write_dir(&self) -> &Path {
        &self.write_dir
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// Where the artifact for `key` is written.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.write_dir.join(key.file_name())
    }

    /// Existing artifact for `key`, override directory first.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let file_name = key.file_name();
        self.override_dir
            .iter()
            .map(|dir| dir.join(&file_name))
            .chain(std::iter::once(self.write_dir.join(&file_name)))
            .find(|path| path.exists())
    }

    /// Path of the artifact and whether it already exists.
    ///
    /// When absent, the returned path lies in the write directory, which is
    /// created if needed; the caller computes and writes the artifact.
    pub fn resolve_or_reserve(&self, key: &CacheKey) -> ProductResult<(PathBuf, bool)> {
        if let Some(path) = self.lookup(key) {
            debug!(key = %key, path = %path.display(), "Cache hit");
            return Ok((path, true));
        }

        std::fs::create_dir_all(&self.write_dir)?;
        debug!(key = %key, "Cache miss");
        Ok((self.path_for(key), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONDENSED: &str = "20200518T101120_S2_L1C_T31TCJ";

    #[test]
    fn test_pixel_key_naming() {
        let key = CacheKey::pixel(CONDENSED, BandId::Red, &PixelSpec::PixelSize(20.0), CleaningPolicy::Clean);
        assert_eq!(key.file_name(), "20200518T101120_S2_L1C_T31TCJ_RED_20-00m.zarr");
        assert_eq!(key.band(), BandId::Red);

        let key = CacheKey::pixel(CONDENSED, BandId::Ndvi, &PixelSpec::PixelSize(10.0), CleaningPolicy::Raw);
        assert_eq!(key.to_string(), "20200518T101120_S2_L1C_T31TCJ_NDVI_10-00m_RAW");

        let key = CacheKey::pixel(
            CONDENSED,
            BandId::Swir1,
            &PixelSpec::Size { width: 100, height: 50 },
            CleaningPolicy::NodataOnly,
        );
        assert_eq!(key.file_name(), "20200518T101120_S2_L1C_T31TCJ_SWIR_1_100x50_NODATA.zarr");
    }

    #[test]
    fn test_window_is_part_of_the_key() {
        let window = BoundingBox::new(300000.0, 4990000.0, 300200.5, 4990200.0);
        let full = CacheKey::pixel(CONDENSED, BandId::Red, &PixelSpec::PixelSize(10.0), CleaningPolicy::Raw);
        let cropped = CacheKey::windowed(
            CONDENSED,
            BandId::Red,
            &PixelSpec::PixelSize(10.0),
            Some(&window),
            CleaningPolicy::Raw,
        );
        assert_ne!(full, cropped);
        assert_eq!(
            cropped.to_string(),
            "20200518T101120_S2_L1C_T31TCJ_RED_10-00m_W300000-00_4990000-00_300200-50_4990200-00_RAW"
        );
    }

    #[test]
    fn test_elevation_key_naming() {
        let dem = ElevationSource::new("/data/dem/COPDEM_30m.vrt");
        let key = CacheKey::elevation(CONDENSED, BandId::Dem, &dem);
        assert_eq!(key.file_name(), "20200518T101120_S2_L1C_T31TCJ_DEM_COPDEM_30m.zarr");
        let key = CacheKey::elevation(CONDENSED, BandId::Hillshade, &dem);
        assert_eq!(key.file_name(), "20200518T101120_S2_L1C_T31TCJ_HILLSHADE_COPDEM_30m.zarr");
    }

    #[test]
    fn test_distinct_parameters_give_distinct_keys() {
        let a = CacheKey::pixel(CONDENSED, BandId::Red, &PixelSpec::PixelSize(10.0), CleaningPolicy::Clean);
        let b = CacheKey::pixel(CONDENSED, BandId::Red, &PixelSpec::PixelSize(20.0), CleaningPolicy::Clean);
        let c = CacheKey::pixel(CONDENSED, BandId::Red, &PixelSpec::PixelSize(10.0), CleaningPolicy::Raw);
        let d = CacheKey::pixel("other", BandId::Red, &PixelSpec::PixelSize(10.0), CleaningPolicy::Clean);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let e = CacheKey::elevation(CONDENSED, BandId::Dem, &ElevationSource::new("srtm.tif"));
        let f = CacheKey::elevation(CONDENSED, BandId::Dem, &ElevationSource::new("copdem.tif"));
        assert_ne!(e, f);
    }

    #[test]
    fn test_key_for_band_category() {
        let options = ResolvedOptions {
            pixel: PixelSpec::PixelSize(20.0),
            resampling: Default::default(),
            cleaning: CleaningPolicy::Clean,
            elevation_source: None,
            window: None,
        };
        let key = CacheKey::for_band(CONDENSED, BandId::Ndwi, &options).unwrap();
        assert_eq!(key.to_string(), "20200518T101120_S2_L1C_T31TCJ_NDWI_20-00m");
        assert!(CacheKey::for_band(CONDENSED, BandId::Clouds, &options).is_none());
        assert!(CacheKey::for_band(CONDENSED, BandId::Slope, &options).is_none());

        let window = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let windowed = ResolvedOptions {
            window: Some(window),
            ..options.clone()
        };
        let key = CacheKey::for_band(CONDENSED, BandId::Ndwi, &windowed).unwrap();
        assert_eq!(
            key.to_string(),
            "20200518T101120_S2_L1C_T31TCJ_NDWI_20-00m_W0-00_0-00_100-00_100-00"
        );

        let options = ResolvedOptions {
            elevation_source: Some(ElevationSource::new("/dem/srtm.tif")),
            ..options
        };
        let key = CacheKey::for_band(CONDENSED, BandId::Slope, &options).unwrap();
        assert_eq!(key.to_string(), "20200518T101120_S2_L1C_T31TCJ_SLOPE_srtm");
    }

    #[test]
    fn test_resolve_or_reserve() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().join("out"), None);
        let key = CacheKey::pixel(CONDENSED, BandId::Red, &PixelSpec::PixelSize(10.0), CleaningPolicy::Clean);

        let (path, exists) = cache.resolve_or_reserve(&key).unwrap();
        assert!(!exists);
        assert_eq!(path, dir.path().join("out").join(key.file_name()));
        assert!(dir.path().join("out").is_dir());

        fs::create_dir_all(&path).unwrap();
        let (again, exists) = cache.resolve_or_reserve(&key).unwrap();
        assert!(exists);
        assert_eq!(again, path);
    }

    #[test]
    fn test_override_dir_checked_first() {
        let dir = tempfile::tempdir().unwrap();
        let override_dir = dir.path().join("seeded");
        let cache = ArtifactCache::new(dir.path().join("out"), Some(override_dir.clone()));
        let key = CacheKey::pixel(CONDENSED, BandId::Nir, &PixelSpec::PixelSize(10.0), CleaningPolicy::Clean);

        fs::create_dir_all(override_dir.join(key.file_name())).unwrap();
        fs::create_dir_all(dir.path().join("out").join(key.file_name())).unwrap();

        let (path, exists) = cache.resolve_or_reserve(&key).unwrap();
        assert!(exists);
        assert!(path.starts_with(&override_dir));
    }
}
