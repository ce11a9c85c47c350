//! Boundary to the raster access service and the cloud mask provider.
//!
//! Decoding product rasters (GeoTIFF, JP2, SAFE measurement files) and
//! warping elevation models are delegated to implementations of
//! [`RasterService`]. The loader only ever asks for whole bands at a pixel
//! spec and for elevation warped onto a grid. Artifact persistence has a
//! default implementation using the Zarr codec.

use std::path::Path;

use eo_common::{BandId, BoundingBox, GridSpec, ProductResult};
use product_resolver::{ProductDescriptor, RawBand};

use crate::config::{ArtifactOptions, ElevationSource};
use crate::types::{PixelSpec, RasterArray, ResamplingMethod};
use crate::writer;

/// One raw band read.
#[derive(Debug, Clone, Copy)]
pub struct BandRead<'a> {
    pub product: &'a ProductDescriptor,
    /// Canonical band being read
    pub band: BandId,
    /// Product-specific handle of the band
    pub raw: &'a RawBand,
    pub pixel: PixelSpec,
    pub resampling: ResamplingMethod,
    /// Sub-window in the product CRS; whole band when unset
    pub window: Option<BoundingBox>,
}

/// Raster access used by the loader.
///
/// Implementations must be safe to share across threads. Despeckled radar
/// bands (`VV_DSPK`, ...) map to the same raw handle as their plain
/// counterpart; filtering them is the implementation's job.
pub trait RasterService: Send + Sync {
    /// Read one raw band resampled to `request.pixel`.
    fn read_band(&self, request: &BandRead<'_>) -> ProductResult<RasterArray>;

    /// Grid the product's bands are delivered on at `pixel`.
    ///
    /// Used to anchor loads that read no raw band (DEM-only, cloud-only).
    fn product_grid(&self, product: &ProductDescriptor, pixel: &PixelSpec) -> ProductResult<GridSpec>;

    /// Warp an elevation raster onto `target`.
    fn warp_elevation(
        &self,
        source: &ElevationSource,
        target: &GridSpec,
        resampling: ResamplingMethod,
    ) -> ProductResult<RasterArray>;

    /// Persist an array, preserving its transform, CRS and nodata value.
    fn write_artifact(&self, array: &RasterArray, path: &Path, options: &ArtifactOptions) -> ProductResult<()> {
        writer::write_artifact(array, path, options)
    }

    /// Read an array persisted by [`RasterService::write_artifact`].
    fn read_artifact(&self, path: &Path) -> ProductResult<RasterArray> {
        writer::read_artifact(path)
    }
}

/// Produces cloud bands for products that offer them.
pub trait CloudMaskProvider: Send + Sync {
    /// Cloud band `band` of `product`, on `grid`.
    fn cloud_mask(&self, product: &ProductDescriptor, band: BandId, grid: &GridSpec) -> ProductResult<RasterArray>;
}
