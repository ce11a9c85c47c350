//! Loading orchestrator.
//!
//! `BandLoader::load` runs one request end to end:
//!
//! 1. deduplicate the request, keeping the caller's order
//! 2. plan it, failing on category or availability errors
//! 3. check that an elevation source and a cloud provider exist when the
//!    plan needs them
//! 4. read (or fetch from cache) each raw band, cleaning it first; inputs
//!    of indices already cached are not read
//! 5. collocate raw bands onto the first one read
//! 6. compute indices, caching each
//! 7. derive DEM-family bands from one shared DEM warp, caching each
//! 8. produce cloud bands
//! 9. collocate everything onto the reference grid again
//! 10. attach product attributes and return bands in request order
//!
//! The reference grid is the first materialized array. DEM-family and
//! cloud bands never set it from a cached artifact: when nothing was read
//! before them, the product grid at the resolved pixel spec (cropped to the
//! window) is the reference. DEM-family artifacts cover the whole product
//! because their keys name neither the pixel spec nor the window.
//!
//! Any failure aborts the whole load.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use eo_common::{BandId, GridSpec, ProductError, ProductResult};
use product_resolver::ProductDescriptor;
use tracing::{debug, info, instrument};

use crate::cache::{ArtifactCache, CacheKey};
use crate::config::{ElevationSource, LoadConfig, LoadOptions, ResolvedOptions};
use crate::indices;
use crate::plan::{plan, BandPlan};
use crate::raster::{BandRead, CloudMaskProvider, RasterService};
use crate::resample::collocate;
use crate::terrain;
use crate::types::{BandCollection, RasterArray};

/// Loads canonical bands of a product through a [`RasterService`].
#[derive(Clone)]
pub struct BandLoader {
    raster: Arc<dyn RasterService>,
    clouds: Option<Arc<dyn CloudMaskProvider>>,
    config: LoadConfig,
}

impl std::fmt::Debug for BandLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandLoader")
            .field("config", &self.config)
            .field("cloud_provider", &self.clouds.is_some())
            .finish()
    }
}

/// State shared by the steps of one load.
struct LoadRun<'a> {
    product: &'a ProductDescriptor,
    options: ResolvedOptions,
    cache: ArtifactCache,
    arrays: HashMap<BandId, RasterArray>,
    reference: Option<GridSpec>,
}

impl BandLoader {
    /// Create a loader; the configuration is validated once here.
    pub fn new(raster: Arc<dyn RasterService>, config: LoadConfig) -> ProductResult<Self> {
        config.validate().map_err(ProductError::InvalidConfig)?;
        Ok(Self {
            raster,
            clouds: None,
            config,
        })
    }

    pub fn with_cloud_provider(mut self, provider: Arc<dyn CloudMaskProvider>) -> Self {
        self.clouds = Some(provider);
        self
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Cache for a product's artifacts under this loader's configuration.
    pub fn cache_for(&self, product: &ProductDescriptor) -> ArtifactCache {
        ArtifactCache::new(
            product.output_directory.clone(),
            self.config.cache_override_dir.clone(),
        )
    }

    /// Key `band` of `product` is cached under for a load with `options`.
    pub fn cache_key(
        &self,
        product: &ProductDescriptor,
        band: BandId,
        options: &LoadOptions,
    ) -> ProductResult<Option<CacheKey>> {
        let resolved = ResolvedOptions::resolve(options, &self.config, product.default_pixel_size)?;
        Ok(CacheKey::for_band(&product.condensed_name, band, &resolved))
    }

    /// Load `requested` bands of `product`.
    ///
    /// The returned collection holds exactly the requested bands (once
    /// each, in first-seen order), all on one grid.
    #[instrument(skip_all, fields(product = %product.condensed_name))]
    pub fn load(
        &self,
        product: &ProductDescriptor,
        requested: &[BandId],
        options: &LoadOptions,
    ) -> ProductResult<BandCollection> {
        let plan = plan(requested, product)?;
        info!(
            requested = ?plan.requested,
            raw = ?plan.raw_bands,
            indices = plan.indices.len(),
            dem = ?plan.dem_bands,
            clouds = ?plan.cloud_bands,
            "Planned load"
        );

        let options = ResolvedOptions::resolve(options, &self.config, product.default_pixel_size)?;
        self.check_providers(&plan, &options)?;

        let mut run = LoadRun {
            product,
            options,
            cache: self.cache_for(product),
            arrays: HashMap::new(),
            reference: None,
        };

        let raw_bands = self.raw_bands_to_read(&run, &plan);
        self.read_raw_bands(&mut run, &raw_bands)?;
        self.compute_indices(&mut run, &plan)?;

        if run.reference.is_none() && (plan.needs_elevation() || !plan.cloud_bands.is_empty()) {
            run.reference = Some(self.reference_grid(&run)?);
        }
        self.derive_terrain(&mut run, &plan)?;
        self.derive_clouds(&mut run, &plan)?;

        let reference = match run.reference {
            Some(grid) => grid,
            None => return Ok(BandCollection::new()),
        };

        let mut collection = BandCollection::new();
        for band in &plan.requested {
            let array = run.arrays.remove(band).ok_or_else(|| ProductError::BandNotAvailable {
                band: *band,
                product: product.name.clone(),
            })?;
            let mut array = collocate(*band, array, &reference, run.options.resampling)?;
            attach_attributes(&mut array, product, *band);
            collection.push(*band, array);
        }

        info!(bands = collection.len(), width = reference.width, height = reference.height, "Loaded bands");
        Ok(collection)
    }

    /// Cheap validation before any I/O.
    fn check_providers(&self, plan: &BandPlan, options: &ResolvedOptions) -> ProductResult<()> {
        if plan.needs_elevation() && options.elevation_source.is_none() {
            return Err(ProductError::MissingElevationSource {
                bands: plan.requested_dem_bands(),
            });
        }
        if !plan.cloud_bands.is_empty() && self.clouds.is_none() {
            return Err(ProductError::MissingCloudProvider {
                bands: plan.cloud_bands.clone(),
            });
        }
        Ok(())
    }

    /// Raw bands the load reads: every requested one, plus the inputs of
    /// indices with no cached artifact.
    fn raw_bands_to_read(&self, run: &LoadRun<'_>, plan: &BandPlan) -> Vec<BandId> {
        let mut needed: HashSet<BandId> = plan
            .raw_bands
            .iter()
            .copied()
            .filter(|band| plan.requested.contains(band))
            .collect();
        for step in &plan.indices {
            match run.cache.lookup(&run.pixel_key(step.index)) {
                Some(path) => debug!(index = %step.index, path = %path.display(), "Index cached, inputs skipped"),
                None => needed.extend(step.inputs.iter().copied()),
            }
        }
        plan.raw_bands.iter().copied().filter(|band| needed.contains(band)).collect()
    }

    fn read_raw_bands(&self, run: &mut LoadRun<'_>, raw_bands: &[BandId]) -> ProductResult<()> {
        let product = run.product;
        for band in raw_bands {
            let key = run.pixel_key(*band);
            let (path, exists) = run.cache.resolve_or_reserve(&key)?;

            let array = if exists {
                self.raster.read_artifact(&path)?
            } else {
                let raw = product.band_map.get(*band).ok_or_else(|| ProductError::BandNotAvailable {
                    band: *band,
                    product: product.name.clone(),
                })?;
                let request = BandRead {
                    product,
                    band: *band,
                    raw,
                    pixel: run.options.pixel,
                    resampling: run.options.resampling,
                    window: run.options.window,
                };
                let mut array = self.raster.read_band(&request)?;
                array.check_shape(*band)?;
                run.options.cleaning.apply(&mut array, product.sensor_type);
                array.set_attribute("band", band.as_str());
                self.raster.write_artifact(&array, &path, &self.config.artifacts)?;
                array
            };

            let array = run.anchor(*band, array)?;
            run.arrays.insert(*band, array);
        }
        Ok(())
    }

    fn compute_indices(&self, run: &mut LoadRun<'_>, plan: &BandPlan) -> ProductResult<()> {
        for step in &plan.indices {
            let key = run.pixel_key(step.index);
            let (path, exists) = run.cache.resolve_or_reserve(&key)?;

            let array = if exists {
                self.raster.read_artifact(&path)?
            } else {
                let spec = indices::lookup(step.index).ok_or_else(|| ProductError::IndexNotComputable {
                    index: step.index,
                    missing: Vec::new(),
                })?;
                let mut inputs = Vec::with_capacity(step.inputs.len());
                for input in &step.inputs {
                    let array = run.arrays.get(input).ok_or_else(|| ProductError::IndexNotComputable {
                        index: step.index,
                        missing: vec![*input],
                    })?;
                    inputs.push(array);
                }
                let first = inputs.first().ok_or_else(|| ProductError::IndexNotComputable {
                    index: step.index,
                    missing: step.inputs.clone(),
                })?;
                let slices: Vec<&[f32]> = inputs.iter().map(|a| a.data.as_slice()).collect();

                let mut array = RasterArray::new(spec.compute(&slices)?, first.grid);
                array.set_attribute("band", step.index.as_str());
                debug!(index = %step.index, "Computed index");
                self.raster.write_artifact(&array, &path, &self.config.artifacts)?;
                array
            };

            let array = run.anchor(step.index, array)?;
            run.arrays.insert(step.index, array);
        }
        Ok(())
    }

    fn derive_terrain(&self, run: &mut LoadRun<'_>, plan: &BandPlan) -> ProductResult<()> {
        if !plan.needs_elevation() {
            return Ok(());
        }
        let elevation: ElevationSource = run.options.elevation_source.clone().ok_or_else(|| {
            ProductError::MissingElevationSource {
                bands: plan.requested_dem_bands(),
            }
        })?;

        // SLOPE and HILLSHADE derive from the DEM as cached, before collocation
        let mut dem: Option<RasterArray> = None;
        for band in &plan.dem_bands {
            let key = CacheKey::elevation(&run.product.condensed_name, *band, &elevation);
            let (path, exists) = run.cache.resolve_or_reserve(&key)?;

            let array = if exists {
                self.raster.read_artifact(&path)?
            } else {
                let mut array = match band {
                    BandId::Dem => {
                        let target = self.raster.product_grid(run.product, &run.options.pixel)?;
                        info!(source = %elevation.location(), "Warping elevation");
                        let dem = self.raster.warp_elevation(&elevation, &target, run.options.resampling)?;
                        dem.check_shape(*band)?;
                        dem
                    }
                    // DEM precedes SLOPE and HILLSHADE in every plan
                    BandId::Slope | BandId::Hillshade => {
                        let dem = dem.as_ref().ok_or_else(|| {
                            ProductError::MissingElevationSource {
                                bands: vec![*band],
                            }
                        })?;
                        if *band == BandId::Slope {
                            terrain::slope(dem, self.config.slope_units)
                        } else {
                            terrain::hillshade(dem, &self.config.hillshade)
                        }
                    }
                    other => {
                        return Err(ProductError::InvalidBandCategory {
                            band: *other,
                            category: other.category().to_string(),
                            sensor: run.product.sensor_type,
                        })
                    }
                };
                array.set_attribute("band", band.as_str());
                array.set_attribute("elevation_source", elevation.location());
                self.raster.write_artifact(&array, &path, &self.config.artifacts)?;
                array
            };

            if *band == BandId::Dem {
                dem = Some(array.clone());
            }
            let array = run.anchor(*band, array)?;
            run.arrays.insert(*band, array);
        }
        Ok(())
    }

    fn derive_clouds(&self, run: &mut LoadRun<'_>, plan: &BandPlan) -> ProductResult<()> {
        if plan.cloud_bands.is_empty() {
            return Ok(());
        }
        let provider = self.clouds.as_ref().ok_or_else(|| ProductError::MissingCloudProvider {
            bands: plan.cloud_bands.clone(),
        })?;

        let grid = self.reference_grid(run)?;
        for band in &plan.cloud_bands {
            let array = provider.cloud_mask(run.product, *band, &grid)?;
            array.check_shape(*band)?;
            let array = run.anchor(*band, array)?;
            run.arrays.insert(*band, array);
        }
        Ok(())
    }

    /// The load's reference grid. Before anything is materialized it is
    /// the product grid at the resolved pixel spec, cropped to the window.
    fn reference_grid(&self, run: &LoadRun<'_>) -> ProductResult<GridSpec> {
        if let Some(grid) = run.reference {
            return Ok(grid);
        }
        let grid = self.raster.product_grid(run.product, &run.options.pixel)?;
        match &run.options.window {
            None => Ok(grid),
            Some(window) => grid.crop(window).ok_or_else(|| {
                ProductError::InvalidConfig(format!(
                    "Load window {:?} does not overlap {}",
                    window, run.product.name
                ))
            }),
        }
    }
}

impl LoadRun<'_> {
    /// Key of a raw band or index under this load's options.
    fn pixel_key(&self, band: BandId) -> CacheKey {
        CacheKey::windowed(
            &self.product.condensed_name,
            band,
            &self.options.pixel,
            self.options.window.as_ref(),
            self.options.cleaning,
        )
    }

    /// Make the first materialized array the reference and collocate every
    /// later one onto it.
    fn anchor(&mut self, band: BandId, array: RasterArray) -> ProductResult<RasterArray> {
        match self.reference {
            Some(reference) => collocate(band, array, &reference, self.options.resampling),
            None => {
                self.reference = Some(array.grid);
                Ok(array)
            }
        }
    }
}

/// Product-level attributes carried by every returned band.
fn attach_attributes(array: &mut RasterArray, product: &ProductDescriptor, band: BandId) {
    array.set_attribute("band", band.as_str());
    array.set_attribute("constellation", product.constellation());
    array.set_attribute("constellation_id", product.constellation_id.as_str());
    array.set_attribute(
        "acquisition_date",
        product.acquisition_datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
    );
    array.set_attribute("condensed_name", product.condensed_name.as_str());
    array.set_attribute("product_path", product.path.to_string_lossy().into_owned());
    array.set_attribute(
        "orbit_direction",
        match product.orbit_direction {
            Some(direction) => serde_json::json!(direction.to_string()),
            None => serde_json::Value::Null,
        },
    );
    array.set_attribute("long_name", format!("{} {}", product.constellation(), band));
}
