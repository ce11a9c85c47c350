//! Descriptor extraction through the product factory.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use eo_common::{BandId, OrbitDirection, ProductResult, SensorType};
use product_resolver::{
    BandMap, DescriptorOverrides, ExtractionContext, FormatBehavior, FormatId, ProductFactory,
    RawBand, Strategy,
};
use test_utils::{
    landsat_members, names, sentinel1_members, sentinel2_members, temp_test_dir, write_product_dir,
    write_zip,
};

const L8_BANDS: &[&str] = &["B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B9", "B10", "B11"];

#[test]
fn test_landsat8_descriptor() {
    let dir = temp_test_dir();
    let path = write_product_dir(
        dir.path(),
        names::LANDSAT8_L1,
        &landsat_members(names::LANDSAT8_L1, L8_BANDS),
    );
    let factory = ProductFactory::with_builtin_formats();
    let product = factory
        .open(&path, Strategy::Both, None, &DescriptorOverrides::default())
        .unwrap();
    let desc = product.descriptor();

    assert_eq!(desc.format, FormatId::L8);
    assert_eq!(desc.sensor_type, SensorType::Optical);
    assert_eq!(desc.constellation_id, "L8");
    assert_eq!(desc.instrument, "OLI-TIRS");
    assert_eq!(desc.product_type, "L1TP");
    assert!(!desc.is_archive);
    assert_eq!(desc.default_pixel_size, 30.0);

    // Scene center time comes from the MTL file
    assert_eq!(desc.acquisition_datetime.date(), NaiveDate::from_ymd_opt(2020, 12, 20).unwrap());
    assert_eq!(desc.acquisition_datetime.hour(), 10);
    assert_eq!(desc.condensed_name, "20201220T105241_L8_L1TP_200030");

    assert_eq!(desc.band_map.get(BandId::Red).unwrap().raw_id, "B4");
    assert_eq!(desc.band_map.get(BandId::Pan).unwrap().gsd, 15.0);
    assert!(desc.has_cloud_band(BandId::Cirrus));
    assert_eq!(desc.orbit_direction, Some(OrbitDirection::Descending));

    assert_eq!(product.output_directory(), product.scratch_dir());
    assert!(product.scratch_dir().is_dir());
}

#[test]
fn test_landsat9_surface_reflectance_band_ids() {
    let dir = temp_test_dir();
    let path = write_product_dir(dir.path(), names::LANDSAT9_L2, &[]);
    let factory = ProductFactory::with_builtin_formats();
    let desc = factory.describe(&path, FormatId::L9).unwrap();

    assert_eq!(desc.constellation_id, "L9");
    assert_eq!(desc.band_map.get(BandId::Red).unwrap().raw_id, "SR_B4");
    assert_eq!(desc.band_map.get(BandId::Tir1).unwrap().raw_id, "ST_B10");
    assert!(!desc.has_band(BandId::Pan));
    // No MTL file: midnight of the name date
    assert_eq!(desc.condensed_name, "20220115T000000_L9_L2SP_200030");
}

#[test]
fn test_pre_collection_has_no_cloud_bands() {
    let dir = temp_test_dir();
    let path = write_product_dir(dir.path(), names::LANDSAT8_PRE_COLLECTION, &[]);
    let desc = ProductFactory::with_builtin_formats()
        .describe(&path, FormatId::L8)
        .unwrap();

    assert_eq!(desc.product_type, "L1");
    assert!(desc.cloud_bands.is_empty());
    assert_eq!(desc.condensed_name, "20200518T000000_L8_L1_023030");
}

#[test]
fn test_sentinel2_l2a_descriptor() {
    let dir = temp_test_dir();
    let path = write_product_dir(
        dir.path(),
        &format!("{}.SAFE", names::SENTINEL2_L2A),
        &sentinel2_members(names::SENTINEL2_L2A),
    );
    let product = ProductFactory::with_builtin_formats()
        .open(&path, Strategy::Both, None, &DescriptorOverrides::default())
        .unwrap();
    let desc = product.descriptor();

    assert_eq!(desc.format, FormatId::S2);
    assert_eq!(desc.name, names::SENTINEL2_L2A);
    assert_eq!(desc.constellation_id, "S2B");
    assert_eq!(desc.product_type, "L2A");
    assert_eq!(desc.condensed_name, "20210712T103629_S2_L2A_T31TCJ");
    assert!(!desc.has_band(BandId::SwirCirrus));
    assert_eq!(desc.band_map.get(BandId::NarrowNir).unwrap().raw_id, "B8A");
    assert!(desc.has_cloud_band(BandId::Clouds));
    assert!(!desc.has_cloud_band(BandId::Shadows));
}

#[test]
fn test_sentinel1_zip_descriptor() {
    let dir = temp_test_dir();
    let safe = format!("{}.SAFE", names::SENTINEL1_GRD);
    let path = write_zip(
        dir.path(),
        &format!("{}.zip", safe),
        Some(&safe),
        &sentinel1_members("ASCENDING"),
    );
    let product = ProductFactory::with_builtin_formats()
        .open(&path, Strategy::Both, None, &DescriptorOverrides::default())
        .unwrap();
    let desc = product.descriptor();

    assert!(desc.is_archive);
    assert_eq!(desc.sensor_type, SensorType::Sar);
    assert_eq!(desc.orbit_direction, Some(OrbitDirection::Ascending));
    assert!(desc.has_band(BandId::Vv));
    assert!(desc.has_band(BandId::VhDspk));
    assert!(!desc.has_band(BandId::Hh));
    assert!(desc.cloud_bands.is_empty());
    assert_eq!(desc.condensed_name, "20200518T055005_S1_GRD_IW_032626");
}

#[test]
fn test_unrecognized_product() {
    let dir = temp_test_dir();
    let path = write_product_dir(dir.path(), "holiday_photos", &[]);
    let err = ProductFactory::with_builtin_formats()
        .open(&path, Strategy::ByName, None, &DescriptorOverrides::default())
        .unwrap_err();
    assert_eq!(err.kind(), "UnrecognizedProduct");
}

#[test]
fn test_format_without_behavior() {
    let dir = temp_test_dir();
    let path = write_product_dir(dir.path(), names::LANDSAT8_L1, &[]);
    let err = ProductFactory::with_builtin_formats()
        .build(&path, FormatId::Capella, &DescriptorOverrides::default())
        .unwrap_err();
    assert_eq!(err.kind(), "UnrecognizedProduct");
}

#[test]
fn test_overrides() {
    let dir = temp_test_dir();
    let path = write_product_dir(dir.path(), names::LANDSAT8_L1, &[]);
    let overrides = DescriptorOverrides {
        output_directory: Some(dir.path().join("out")),
        scratch_root: Some(dir.path().join("scratch")),
        default_pixel_size: Some(60.0),
    };
    let mut product = ProductFactory::with_builtin_formats()
        .build(&path, FormatId::L8, &overrides)
        .unwrap();

    assert_eq!(product.descriptor().default_pixel_size, 60.0);
    assert_eq!(product.output_directory(), dir.path().join("out"));
    assert!(product.scratch_dir().starts_with(dir.path().join("scratch")));

    product.set_output_directory(dir.path().join("elsewhere")).unwrap();
    assert!(dir.path().join("elsewhere").is_dir());
    assert_eq!(product.descriptor().output_directory, dir.path().join("elsewhere"));
}

#[test]
fn test_clear_removes_scratch() {
    let dir = temp_test_dir();
    let path = write_product_dir(dir.path(), names::LANDSAT8_L1, &[]);
    let product = ProductFactory::with_builtin_formats()
        .build(&path, FormatId::L8, &DescriptorOverrides::default())
        .unwrap();
    let scratch = product.scratch_dir().to_path_buf();
    assert!(scratch.exists());

    product.clear().unwrap();
    assert!(!scratch.exists());
}

// ============================================================================
// Custom behaviors
// ============================================================================

/// Each step reads what the previous steps extracted.
struct ChainedBehavior;

impl FormatBehavior for ChainedBehavior {
    fn datetime(&self, ctx: &ExtractionContext<'_>) -> ProductResult<NaiveDateTime> {
        let name = ctx.name()?;
        NaiveDateTime::parse_from_str(&name[name.len() - 15..], "%Y%m%dT%H%M%S")
            .map_err(|e| ctx.invalid(e.to_string()))
    }

    fn constellation_id(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok("C03".to_string())
    }

    fn instrument(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(format!("{}-SAR", ctx.constellation_id()?))
    }

    fn product_type(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(if ctx.instrument()?.ends_with("SAR") { "GEO" } else { "?" }.to_string())
    }

    fn default_pixel_size(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<f64> {
        Ok(0.5)
    }

    fn band_map(&self, ctx: &ExtractionContext<'_>) -> ProductResult<BandMap> {
        let mut map = BandMap::new();
        map.insert(BandId::Hh, RawBand::new("HH", ctx.pixel_size()?))?;
        Ok(map)
    }
}

#[test]
fn test_registered_behavior_sees_earlier_steps() {
    let dir = temp_test_dir();
    let path = write_product_dir(dir.path(), "capella_scene_20210101T101010", &[]);
    let mut factory = ProductFactory::with_builtin_formats();
    factory.register(FormatId::Capella, Arc::new(ChainedBehavior));

    let desc = factory.describe(&path, FormatId::Capella).unwrap();
    assert_eq!(desc.instrument, "C03-SAR");
    assert_eq!(desc.product_type, "GEO");
    assert_eq!(desc.band_map.get(BandId::Hh).unwrap().gsd, 0.5);
    assert_eq!(desc.condensed_name, "20210101T101010_CAPELLA_GEO");
    assert_eq!(desc.sensor_type, SensorType::Sar);
}
