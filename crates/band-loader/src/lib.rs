//! Band loading for resolved EO products.
//!
//! Turns a list of canonical band identifiers into an aligned collection
//! of raster arrays. Raw bands, spectral indices and terrain derivatives
//! are persisted as Zarr artifacts keyed by every parameter that shapes
//! them, so repeated loads of the same product are served from disk.
//!
//! # Architecture
//!
//! ```text
//! BandLoader::load(product, [NDVI, SLOPE, RED])
//!      │
//!      ├─► plan()  ── category / availability checks, dependency expansion
//!      │
//!      ├─► raw bands ──► ArtifactCache ──┬─► hit:  read_artifact
//!      │                                 └─► miss: RasterService::read_band
//!      │                                           → clean → write_artifact
//!      │
//!      ├─► indices   ── computed from collocated raw bands, cached
//!      │
//!      ├─► DEM       ── one warp onto the reference grid, cached
//!      │     └─► SLOPE / HILLSHADE derived from it, cached
//!      │
//!      ├─► clouds    ── CloudMaskProvider on the reference grid
//!      │
//!      └─► collocate() everything onto the first band's grid
//!               │
//!               ▼
//!          BandCollection (request order)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use band_loader::{BandLoader, LoadConfig, LoadOptions};
//! use eo_common::BandId;
//!
//! let loader = BandLoader::new(raster_service, LoadConfig::from_env())?;
//! let bands = loader.load(
//!     product.descriptor(),
//!     &[BandId::Ndvi, BandId::Red],
//!     &LoadOptions::new().pixel_size(20.0),
//! )?;
//! ```

pub mod cache;
pub mod config;
pub mod indices;
pub mod loader;
pub mod plan;
pub mod raster;
pub mod resample;
pub mod terrain;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use cache::{ArtifactCache, CacheKey, ARTIFACT_EXTENSION};
pub use config::{
    ArtifactCompression, ArtifactOptions, ElevationSource, HillshadeParams, LoadConfig, LoadOptions,
    ResolvedOptions,
};
pub use indices::IndexSpec;
pub use loader::BandLoader;
pub use plan::{plan, BandPlan, IndexStep};
pub use raster::{BandRead, CloudMaskProvider, RasterService};
pub use resample::collocate;
pub use types::{BandCollection, CleaningPolicy, PixelSpec, RasterArray, ResamplingMethod, SlopeUnits};
pub use writer::{read_artifact, write_artifact};
