//! CLI command implementations.

use std::path::{Path, PathBuf};

use band_loader::{plan, ArtifactCache, BandPlan, CacheKey, CleaningPolicy, LoadConfig, LoadOptions, ResolvedOptions};
use eo_common::{BandId, BoundingBox, ProductError, ProductResult};
use product_resolver::{FormatId, ProductDescriptor, ProductFactory, Strategy};
use serde::Serialize;
use tracing::debug;

/// Outcome of `resolve`.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub path: PathBuf,
    pub strategy: String,
    pub format: Option<FormatId>,
    pub constellation: Option<&'static str>,
}

/// Outcome of `cache-path`.
#[derive(Debug, Clone, Serialize)]
pub struct CachePathReport {
    pub band: BandId,
    /// `None` for bands that are never cached
    pub key: Option<String>,
    pub path: Option<PathBuf>,
    pub exists: bool,
}

/// Which format `path` resolves to, if any.
pub fn resolve(
    factory: &ProductFactory,
    path: &Path,
    strategy: Strategy,
    formats: Option<&[FormatId]>,
) -> ProductResult<ResolveReport> {
    let format = factory.resolver().resolve(path, strategy, formats)?;
    debug!(path = %path.display(), format = ?format, "Resolved product");
    Ok(ResolveReport {
        path: path.to_path_buf(),
        strategy: strategy.to_string(),
        format,
        constellation: format.map(|f| f.name()),
    })
}

/// Descriptor of the product at `path`.
pub fn describe(factory: &ProductFactory, path: &Path, strategy: Strategy) -> ProductResult<ProductDescriptor> {
    let format = factory
        .resolver()
        .resolve(path, strategy, None)?
        .ok_or_else(|| ProductError::UnrecognizedProduct(path.to_path_buf()))?;
    factory.describe(path, format)
}

/// Load plan for `bands` of the product at `path`.
pub fn plan_bands(factory: &ProductFactory, path: &Path, strategy: Strategy, bands: &[BandId]) -> ProductResult<BandPlan> {
    let descriptor = describe(factory, path, strategy)?;
    plan(bands, &descriptor)
}

/// Options of a `cache-path` lookup.
#[derive(Debug, Clone)]
pub struct CachePathQuery {
    pub band: BandId,
    pub pixel_size: Option<f64>,
    pub cleaning: Option<CleaningPolicy>,
    /// Read window in the product CRS
    pub window: Option<BoundingBox>,
    /// Directory artifacts are written to
    pub output_dir: PathBuf,
}

/// Where the artifact of one band lives, and whether it exists yet.
pub fn cache_path(
    factory: &ProductFactory,
    path: &Path,
    strategy: Strategy,
    config: &LoadConfig,
    query: &CachePathQuery,
) -> ProductResult<CachePathReport> {
    let band = query.band;
    let descriptor = describe(factory, path, strategy)?;

    let mut options = LoadOptions::new();
    if let Some(pixel_size) = query.pixel_size {
        options = options.pixel_size(pixel_size);
    }
    if let Some(cleaning) = query.cleaning {
        options = options.cleaning(cleaning);
    }
    if let Some(window) = query.window {
        options = options.window(window);
    }
    let resolved = ResolvedOptions::resolve(&options, config, descriptor.default_pixel_size)?;

    let Some(key) = CacheKey::for_band(&descriptor.condensed_name, band, &resolved) else {
        return Ok(CachePathReport {
            band,
            key: None,
            path: None,
            exists: false,
        });
    };

    let cache = ArtifactCache::new(&query.output_dir, config.cache_override_dir.clone());
    let (path, exists) = match cache.lookup(&key) {
        Some(found) => (found, true),
        None => (cache.path_for(&key), false),
    };
    Ok(CachePathReport {
        band,
        key: Some(key.to_string()),
        path: Some(path),
        exists,
    })
}
