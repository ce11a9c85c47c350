//! Builds [`Product`]s from a path and a resolved format.
//!
//! Each format plugs in a [`FormatBehavior`]. The factory calls its
//! extraction steps in a fixed order (name, datetime, constellation id,
//! instrument, product type, pixel size, band map) and records each result
//! in an [`ExtractionContext`], so a step can read everything extracted
//! before it.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use eo_common::{BandId, OrbitDirection, ProductError, ProductResult};
use tracing::{debug, info, instrument};

use crate::descriptor::{BandMap, Product, ProductDescriptor};
use crate::formats;
use crate::registry::{FormatId, FormatRegistry};
use crate::resolver::{Resolver, Strategy};
use crate::source::{open_source, FileSource};

/// Facts extracted so far for the product being built.
pub struct ExtractionContext<'a> {
    pub path: &'a Path,
    pub source: &'a dyn FileSource,
    pub format: FormatId,
    name: Option<String>,
    datetime: Option<NaiveDateTime>,
    constellation_id: Option<String>,
    instrument: Option<String>,
    product_type: Option<String>,
    pixel_size: Option<f64>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(path: &'a Path, source: &'a dyn FileSource, format: FormatId) -> Self {
        Self {
            path,
            source,
            format,
            name: None,
            datetime: None,
            constellation_id: None,
            instrument: None,
            product_type: None,
            pixel_size: None,
        }
    }

    fn not_ready(&self, step: &str) -> ProductError {
        ProductError::invalid_product(
            self.path,
            format!("{} requested before it was extracted", step),
        )
    }

    pub fn name(&self) -> ProductResult<&str> {
        self.name.as_deref().ok_or_else(|| self.not_ready("name"))
    }

    pub fn datetime(&self) -> ProductResult<NaiveDateTime> {
        self.datetime.ok_or_else(|| self.not_ready("datetime"))
    }

    pub fn constellation_id(&self) -> ProductResult<&str> {
        self.constellation_id
            .as_deref()
            .ok_or_else(|| self.not_ready("constellation id"))
    }

    pub fn instrument(&self) -> ProductResult<&str> {
        self.instrument
            .as_deref()
            .ok_or_else(|| self.not_ready("instrument"))
    }

    pub fn product_type(&self) -> ProductResult<&str> {
        self.product_type
            .as_deref()
            .ok_or_else(|| self.not_ready("product type"))
    }

    pub fn pixel_size(&self) -> ProductResult<f64> {
        self.pixel_size.ok_or_else(|| self.not_ready("pixel size"))
    }

    /// Shorthand for an InvalidProduct error on this product.
    pub fn invalid(&self, msg: impl Into<String>) -> ProductError {
        ProductError::invalid_product(self.path, msg)
    }
}

/// Format-specific extraction hooks.
pub trait FormatBehavior: Send + Sync {
    /// Product name; defaults to the path's terminal component without
    /// archive extension.
    fn name(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(ctx.source.product_name())
    }

    fn datetime(&self, ctx: &ExtractionContext<'_>) -> ProductResult<NaiveDateTime>;

    fn constellation_id(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String>;

    fn instrument(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String>;

    fn product_type(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String>;

    /// Native pixel size in meters.
    fn default_pixel_size(&self, ctx: &ExtractionContext<'_>) -> ProductResult<f64>;

    fn band_map(&self, ctx: &ExtractionContext<'_>) -> ProductResult<BandMap>;

    /// Extra condensed-name component (tile, path/row...).
    fn disambiguator(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<Option<String>> {
        Ok(None)
    }

    fn orbit_direction(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<Option<OrbitDirection>> {
        Ok(None)
    }

    /// Whether the product ships a mask for this cloud band.
    fn has_cloud_band(&self, _ctx: &ExtractionContext<'_>, _band: BandId) -> bool {
        false
    }
}

/// Caller overrides applied while building a product.
#[derive(Debug, Clone, Default)]
pub struct DescriptorOverrides {
    /// Where generated artifacts go instead of the scratch directory.
    pub output_directory: Option<PathBuf>,
    /// Parent of the scratch directory (system temp dir by default).
    pub scratch_root: Option<PathBuf>,
    /// Replaces the format's native pixel size.
    pub default_pixel_size: Option<f64>,
}

/// Creates products for the formats it has behaviors for.
#[derive(Clone)]
pub struct ProductFactory {
    resolver: Resolver,
    behaviors: HashMap<FormatId, Arc<dyn FormatBehavior>>,
}

impl Default for ProductFactory {
    fn default() -> Self {
        Self::with_builtin_formats()
    }
}

impl ProductFactory {
    /// A factory over `registry` with no behaviors registered.
    pub fn new(registry: Arc<FormatRegistry>) -> Self {
        Self {
            resolver: Resolver::new(registry),
            behaviors: HashMap::new(),
        }
    }

    /// Built-in registry and the built-in Landsat, Sentinel-1 and
    /// Sentinel-2 behaviors.
    pub fn with_builtin_formats() -> Self {
        let mut factory = Self::new(FormatRegistry::builtin());
        formats::register_builtin(&mut factory);
        factory
    }

    pub fn register(&mut self, format: FormatId, behavior: Arc<dyn FormatBehavior>) {
        self.behaviors.insert(format, behavior);
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Formats that can be built, in registry order.
    pub fn supported_formats(&self) -> Vec<FormatId> {
        self.resolver
            .registry()
            .formats()
            .filter(|f| self.behaviors.contains_key(f))
            .collect()
    }

    /// Resolve `path` and build its product.
    ///
    /// # Errors
    ///
    /// [`ProductError::UnrecognizedProduct`] if no format matches, plus
    /// everything [`ProductFactory::build`] returns.
    pub fn open(
        &self,
        path: &Path,
        strategy: Strategy,
        candidates: Option<&[FormatId]>,
        overrides: &DescriptorOverrides,
    ) -> ProductResult<Product> {
        let source = open_source(path)?;
        let format = self
            .resolver
            .resolve_source(source.as_ref(), strategy, candidates)?
            .ok_or_else(|| ProductError::UnrecognizedProduct(path.to_path_buf()))?;
        self.build_from_source(path, source.as_ref(), format, overrides)
    }

    /// Build the product at `path` for an already known format.
    ///
    /// # Errors
    ///
    /// - [`ProductError::UnrecognizedProduct`] if no behavior is registered
    ///   for `format`
    /// - [`ProductError::InvalidProduct`] if an extraction step fails
    pub fn build(
        &self,
        path: &Path,
        format: FormatId,
        overrides: &DescriptorOverrides,
    ) -> ProductResult<Product> {
        let source = open_source(path)?;
        self.build_from_source(path, source.as_ref(), format, overrides)
    }

    /// Extract the descriptor only (no scratch directory).
    pub fn describe(&self, path: &Path, format: FormatId) -> ProductResult<ProductDescriptor> {
        let source = open_source(path)?;
        self.extract(path, source.as_ref(), format, None)
    }

    #[instrument(skip_all, fields(path = %path.display(), format = %format))]
    fn build_from_source(
        &self,
        path: &Path,
        source: &dyn FileSource,
        format: FormatId,
        overrides: &DescriptorOverrides,
    ) -> ProductResult<Product> {
        let descriptor = self.extract(path, source, format, overrides.default_pixel_size)?;

        let mut builder = tempfile::Builder::new();
        let prefix = format!("{}_", descriptor.condensed_name);
        builder.prefix(&prefix);
        let scratch = match &overrides.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let product = Product::new(descriptor, scratch, overrides.output_directory.clone())?;
        info!(
            condensed_name = %product.descriptor().condensed_name,
            bands = product.descriptor().band_map.len(),
            "Built product"
        );
        Ok(product)
    }

    fn extract(
        &self,
        path: &Path,
        source: &dyn FileSource,
        format: FormatId,
        pixel_override: Option<f64>,
    ) -> ProductResult<ProductDescriptor> {
        let behavior = self
            .behaviors
            .get(&format)
            .ok_or_else(|| ProductError::UnrecognizedProduct(path.to_path_buf()))?;

        let mut ctx = ExtractionContext::new(path, source, format);
        ctx.name = Some(behavior.name(&ctx)?);
        ctx.datetime = Some(behavior.datetime(&ctx)?);
        ctx.constellation_id = Some(behavior.constellation_id(&ctx)?);
        ctx.instrument = Some(behavior.instrument(&ctx)?);
        ctx.product_type = Some(behavior.product_type(&ctx)?);

        let pixel_size = match pixel_override {
            Some(px) if px > 0.0 => px,
            Some(px) => {
                return Err(ProductError::InvalidConfig(format!(
                    "pixel size must be positive, got {}",
                    px
                )))
            }
            None => behavior.default_pixel_size(&ctx)?,
        };
        ctx.pixel_size = Some(pixel_size);

        let band_map = behavior.band_map(&ctx)?;
        let disambiguator = behavior.disambiguator(&ctx)?;
        let orbit_direction = behavior.orbit_direction(&ctx)?;
        let cloud_bands: BTreeSet<BandId> = BandId::ALL
            .iter()
            .copied()
            .filter(|b| b.category() == eo_common::BandCategory::Cloud)
            .filter(|b| behavior.has_cloud_band(&ctx, *b))
            .collect();

        let datetime = ctx.datetime()?;
        let product_type = ctx.product_type()?.to_string();
        let condensed_name = condensed_name(datetime, format, &product_type, disambiguator.as_deref());
        debug!(condensed_name = %condensed_name, "Extracted product descriptor");

        Ok(ProductDescriptor {
            path: path.to_path_buf(),
            is_archive: source.is_archive(),
            format,
            sensor_type: format.sensor_type(),
            name: ctx.name()?.to_string(),
            product_type,
            instrument: ctx.instrument()?.to_string(),
            constellation_id: ctx.constellation_id()?.to_string(),
            acquisition_datetime: datetime,
            default_pixel_size: pixel_size,
            band_map,
            cloud_bands,
            orbit_direction,
            condensed_name,
            output_directory: PathBuf::new(),
        })
    }
}

/// `{YYYYMMDDTHHMMSS}_{FORMAT}_{PRODUCT_TYPE}[_{DISAMBIGUATOR}]`, with
/// characters outside `[A-Za-z0-9_-]` replaced by `-`.
pub fn condensed_name(
    datetime: NaiveDateTime,
    format: FormatId,
    product_type: &str,
    disambiguator: Option<&str>,
) -> String {
    let mut name = format!(
        "{}_{}_{}",
        datetime.format("%Y%m%dT%H%M%S"),
        format.code(),
        sanitize(product_type)
    );
    if let Some(extra) = disambiguator.filter(|d| !d.is_empty()) {
        name.push('_');
        name.push_str(&sanitize(extra));
    }
    name
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::parse_compact_datetime;

    #[test]
    fn test_condensed_name() {
        let dt = parse_compact_datetime("20200518T101120").unwrap();
        assert_eq!(
            condensed_name(dt, FormatId::S2, "L1C", Some("T31TCJ")),
            "20200518T101120_S2_L1C_T31TCJ"
        );
        assert_eq!(condensed_name(dt, FormatId::L8, "L1TP", None), "20200518T101120_L8_L1TP");
        assert_eq!(
            condensed_name(dt, FormatId::S1, "GRD", Some("IW 1.2")),
            "20200518T101120_S1_GRD_IW-1-2"
        );
    }

    #[test]
    fn test_supported_formats_follow_registry_order() {
        let factory = ProductFactory::with_builtin_formats();
        let formats = factory.supported_formats();
        assert!(formats.contains(&FormatId::S2));
        assert!(formats.contains(&FormatId::L8));
        assert!(formats.contains(&FormatId::S1));
        let pos = |f| formats.iter().position(|x| *x == f).unwrap();
        assert!(pos(FormatId::L9) < pos(FormatId::L8));
    }
}
