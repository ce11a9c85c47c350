//! Shared helpers for band-loader integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use band_loader::{
    BandRead, CloudMaskProvider, ElevationSource, PixelSpec, RasterArray, RasterService, ResamplingMethod,
};
use eo_common::{BandId, BoundingBox, Crs, GridSpec, ProductError, ProductResult};
use product_resolver::{DescriptorOverrides, Product, ProductDescriptor, ProductFactory, Strategy};
use test_utils::{create_dem_grid, create_reflectance_grid, names, sentinel1_members, sentinel2_members, write_product_dir};

/// Footprint of every mocked product: 400 m square in UTM 31N.
pub fn footprint() -> BoundingBox {
    BoundingBox::new(300000.0, 4990000.0, 300400.0, 4990400.0)
}

pub fn utm() -> Crs {
    Crs::from_epsg(32631)
}

pub fn grid_for(pixel: &PixelSpec) -> GridSpec {
    match pixel {
        PixelSpec::PixelSize(px) => GridSpec::from_bounds(&footprint(), *px, Some(utm())),
        PixelSpec::Size { width, height } => {
            GridSpec::from_bounds_and_shape(&footprint(), *width, *height, Some(utm()))
        }
    }
}

/// In-memory raster service producing deterministic grids and counting
/// calls.
#[derive(Debug, Default)]
pub struct MockRasterService {
    /// Deliver bands at their native GSD instead of the requested pixel
    pub native_resolution: bool,
    pub reads: AtomicUsize,
    pub warps: AtomicUsize,
    pub writes: AtomicUsize,
    pub read_bands: Mutex<Vec<BandId>>,
}

impl MockRasterService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native() -> Self {
        Self {
            native_resolution: true,
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn warps(&self) -> usize {
        self.warps.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn read_bands(&self) -> Vec<BandId> {
        self.read_bands.lock().unwrap().clone()
    }
}

impl RasterService for MockRasterService {
    fn read_band(&self, request: &BandRead<'_>) -> ProductResult<RasterArray> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_bands.lock().unwrap().push(request.band);

        let grid = if self.native_resolution {
            grid_for(&PixelSpec::PixelSize(request.raw.gsd))
        } else {
            grid_for(&request.pixel)
        };
        let grid = match &request.window {
            Some(window) => grid.crop(window).ok_or_else(|| ProductError::RasterIo {
                path: request.product.path.clone(),
                message: format!("window {:?} misses the product", window),
            })?,
            None => grid,
        };
        let seed = request.band.as_str().bytes().map(u32::from).sum();
        let mut array = RasterArray::new(create_reflectance_grid(grid.width, grid.height, seed), grid);
        array.set_attribute("raw_id", request.raw.raw_id.as_str());
        Ok(array)
    }

    fn product_grid(&self, _product: &ProductDescriptor, pixel: &PixelSpec) -> ProductResult<GridSpec> {
        Ok(grid_for(pixel))
    }

    fn warp_elevation(
        &self,
        _source: &ElevationSource,
        target: &GridSpec,
        _resampling: ResamplingMethod,
    ) -> ProductResult<RasterArray> {
        self.warps.fetch_add(1, Ordering::SeqCst);
        Ok(RasterArray::new(create_dem_grid(target.width, target.height, 250.0), *target))
    }

    fn write_artifact(&self, array: &RasterArray, path: &Path, options: &band_loader::ArtifactOptions) -> ProductResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        band_loader::write_artifact(array, path, options)
    }
}

/// Cloud provider flagging the left half of the grid as cloudy.
#[derive(Debug, Default)]
pub struct MockCloudProvider {
    pub calls: AtomicUsize,
}

impl CloudMaskProvider for MockCloudProvider {
    fn cloud_mask(&self, _product: &ProductDescriptor, _band: BandId, grid: &GridSpec) -> ProductResult<RasterArray> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut data = vec![0.0; grid.len()];
        for row in 0..grid.height {
            for col in 0..grid.width / 2 {
                data[row * grid.width + col] = 1.0;
            }
        }
        Ok(RasterArray::new(data, *grid))
    }
}

/// Open a synthetic Sentinel-2 L2A product with artifacts under `output`.
pub fn sentinel2_product(parent: &Path, output: &Path) -> Product {
    let path = write_product_dir(
        parent,
        &format!("{}.SAFE", names::SENTINEL2_L2A),
        &sentinel2_members(names::SENTINEL2_L2A),
    );
    ProductFactory::with_builtin_formats()
        .open(&path, Strategy::Both, None, &overrides(output))
        .unwrap()
}

/// Open a synthetic Sentinel-1 GRD product with artifacts under `output`.
pub fn sentinel1_product(parent: &Path, output: &Path) -> Product {
    let path = write_product_dir(
        parent,
        &format!("{}.SAFE", names::SENTINEL1_GRD),
        &sentinel1_members("DESCENDING"),
    );
    ProductFactory::with_builtin_formats()
        .open(&path, Strategy::Both, None, &overrides(output))
        .unwrap()
}

fn overrides(output: &Path) -> DescriptorOverrides {
    DescriptorOverrides {
        output_directory: Some(output.to_path_buf()),
        ..DescriptorOverrides::default()
    }
}

/// Artifact directories in `dir`, sorted by name.
pub fn artifacts(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".zarr"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Modification times of every file below `dir`.
pub fn mtimes(dir: &Path) -> BTreeSet<(PathBuf, SystemTime)> {
    walk(dir)
        .into_iter()
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((path, modified))
        })
        .collect()
}

fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.is_dir() {
                files.extend(walk(&path));
            } else {
                files.push(path);
            }
        }
    }
    files
}
