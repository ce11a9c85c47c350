//! Zarr V3 codec for cached band artifacts.
//!
//! Each artifact is a single 2D `float32` array in its own `.zarr`
//! directory. Placement travels in the array attributes:
//!
//! - `geotransform`: GDAL-ordered affine coefficients
//! - `crs`: `"EPSG:xxxx"` or null
//! - `nodata`: finite nodata value or null (the fill value is NaN)
//!
//! Every other attribute of the [`RasterArray`] is stored alongside.
//! Writes go to a hidden temporary sibling which is renamed into place, so
//! readers never observe a half-written artifact.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use eo_common::{Crs, GeoTransform, GridSpec, ProductError, ProductResult};
use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::config::{ArtifactCompression, ArtifactOptions};
use crate::types::RasterArray;

const ATTR_TRANSFORM: &str = "geotransform";
const ATTR_CRS: &str = "crs";
const ATTR_NODATA: &str = "nodata";

/// Write an array to `path` as a Zarr V3 store.
///
/// An existing artifact at `path` is replaced (last writer wins).
pub fn write_artifact(array: &RasterArray, path: &Path, options: &ArtifactOptions) -> ProductResult<()> {
    if array.data.len() != array.grid.len() {
        return Err(ProductError::raster_io(
            path,
            format!("{} values for a {}x{} grid", array.data.len(), array.grid.width, array.grid.height),
        ));
    }

    let parent = path
        .parent()
        .ok_or_else(|| ProductError::raster_io(path, "artifact path has no parent directory"))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .tempdir_in(parent)?;

    write_store(array, staging.path(), options).map_err(|e| ProductError::raster_io(path, e))?;

    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    if let Err(e) = fs::rename(staging.path(), path) {
        // A concurrent writer may have won the race with identical content
        if !path.exists() {
            return Err(ProductError::raster_io(path, e.to_string()));
        }
    }

    debug!(path = %path.display(), width = array.grid.width, height = array.grid.height, "Wrote artifact");
    Ok(())
}

fn write_store(array: &RasterArray, dir: &Path, options: &ArtifactOptions) -> Result<(), String> {
    let (height, width) = (array.grid.height as u64, array.grid.width as u64);
    let chunk = options.chunk_size.max(1) as u64;
    let store = Arc::new(FilesystemStore::new(dir).map_err(|e| e.to_string())?);

    let chunk_grid: zarrs::array::ChunkGrid = vec![chunk.min(height).max(1), chunk.min(width).max(1)]
        .try_into()
        .map_err(|e| format!("{:?}", e))?;

    let mut binding = ArrayBuilder::new(
        vec![height, width], // shape [rows, cols]
        DataType::Float32,
        chunk_grid,
        FillValue::from(f32::NAN),
    );
    let mut builder = binding.attributes(encode_attributes(array));

    if options.compression != ArtifactCompression::None {
        let codec = compression_codec(options)?;
        builder = builder.bytes_to_bytes_codecs(vec![codec]);
    }

    let zarr = builder.build(store, "/").map_err(|e| e.to_string())?;
    zarr.store_metadata().map_err(|e| e.to_string())?;

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![height, width])
        .map_err(|e| e.to_string())?;
    zarr.store_array_subset_elements(&subset, &array.data)
        .map_err(|e| e.to_string())
}

fn compression_codec(
    options: &ArtifactOptions,
) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>, String> {
    let level = BloscCompressionLevel::try_from(options.compression_level)
        .map_err(|_| "Invalid compression level".to_string())?;

    let compressor = match options.compression {
        ArtifactCompression::None => return Err("No compression configured".to_string()),
        ArtifactCompression::BloscLz4 => BloscCompressor::LZ4,
        ArtifactCompression::BloscZstd => BloscCompressor::Zstd,
    };

    // typesize is required when shuffle is enabled (f32 = 4 bytes)
    let codec = BloscCodec::new(compressor, level, None, BloscShuffleMode::Shuffle, Some(4))
        .map_err(|e| e.to_string())?;
    Ok(Arc::new(codec))
}

fn encode_attributes(array: &RasterArray) -> serde_json::Map<String, serde_json::Value> {
    let mut attrs: serde_json::Map<String, serde_json::Value> = array
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    attrs.insert(
        ATTR_TRANSFORM.to_string(),
        serde_json::json!(array.grid.transform.to_gdal()),
    );
    attrs.insert(
        ATTR_CRS.to_string(),
        match array.grid.crs {
            Some(crs) => serde_json::json!(crs.to_string()),
            None => serde_json::Value::Null,
        },
    );
    attrs.insert(
        ATTR_NODATA.to_string(),
        match array.nodata.filter(|nd| nd.is_finite()) {
            Some(nd) => serde_json::json!(nd),
            None => serde_json::Value::Null,
        },
    );
    attrs
}

/// Read an artifact written by [`write_artifact`].
pub fn read_artifact(path: &Path) -> ProductResult<RasterArray> {
    let store = FilesystemStore::new(path).map_err(|e| ProductError::raster_io(path, e.to_string()))?;
    let zarr = Array::open(Arc::new(store), "/").map_err(|e| ProductError::raster_io(path, e.to_string()))?;

    let shape = zarr.shape().to_vec();
    if shape.len() != 2 {
        return Err(ProductError::raster_io(
            path,
            format!("expected a 2D array, found {} dimensions", shape.len()),
        ));
    }

    let mut attributes: BTreeMap<String, serde_json::Value> = zarr
        .attributes()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let transform = attributes
        .remove(ATTR_TRANSFORM)
        .and_then(|v| serde_json::from_value::<[f64; 6]>(v).ok())
        .map(GeoTransform::from_gdal)
        .ok_or_else(|| ProductError::raster_io(path, "missing geotransform attribute"))?;

    let crs = match attributes.remove(ATTR_CRS) {
        Some(serde_json::Value::String(s)) => Some(
            s.parse::<Crs>()
                .map_err(|e| ProductError::raster_io(path, e.to_string()))?,
        ),
        _ => None,
    };

    let nodata = attributes
        .remove(ATTR_NODATA)
        .and_then(|v| v.as_f64())
        .map(|v| v as f32);

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], shape.clone())
        .map_err(|e| ProductError::raster_io(path, e.to_string()))?;
    let data: Vec<f32> = zarr
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| ProductError::raster_io(path, e.to_string()))?;

    let grid = GridSpec::new(shape[1] as usize, shape[0] as usize, transform, crs);
    Ok(RasterArray {
        data,
        grid,
        nodata,
        attributes,
    })
}
