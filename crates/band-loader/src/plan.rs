//! Band dependency planning.
//!
//! A [`BandPlan`] says what a load has to read, compute and derive. It is
//! either fully valid or rejected: every category and availability check
//! runs here, before any raster I/O.

use eo_common::{BandCategory, BandId, ProductError, ProductResult};
use product_resolver::ProductDescriptor;
use serde::Serialize;

use crate::indices;

/// One index to compute and the raw bands it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStep {
    pub index: BandId,
    pub inputs: Vec<BandId>,
}

/// Ordered dependency list for one load request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BandPlan {
    /// Requested bands, deduplicated, in the caller's order
    pub requested: Vec<BandId>,
    /// Unique raw reads: requested raw bands first, then index inputs
    pub raw_bands: Vec<BandId>,
    pub indices: Vec<IndexStep>,
    /// DEM first, then SLOPE/HILLSHADE which reuse its warp
    pub dem_bands: Vec<BandId>,
    pub cloud_bands: Vec<BandId>,
}

impl BandPlan {
    /// Whether the plan derives anything from an elevation source.
    pub fn needs_elevation(&self) -> bool {
        !self.dem_bands.is_empty()
    }

    /// DEM-family bands the caller asked for.
    pub fn requested_dem_bands(&self) -> Vec<BandId> {
        self.requested.iter().copied().filter(BandId::is_dem_family).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }
}

/// Remove duplicates, keeping the first occurrence of each band.
pub fn dedup_preserving_order(bands: &[BandId]) -> Vec<BandId> {
    let mut unique = Vec::with_capacity(bands.len());
    for band in bands {
        if !unique.contains(band) {
            unique.push(*band);
        }
    }
    unique
}

/// Plan the load of `requested` bands from `product`.
pub fn plan(requested: &[BandId], product: &ProductDescriptor) -> ProductResult<BandPlan> {
    let sensor = product.sensor_type;
    let requested = dedup_preserving_order(requested);

    let mut plan = BandPlan {
        requested: requested.clone(),
        ..BandPlan::default()
    };
    let mut index_inputs = Vec::new();
    let mut dem_requested = Vec::new();

    let invalid_category = |band: BandId| ProductError::InvalidBandCategory {
        band,
        category: band.category().to_string(),
        sensor,
    };
    let not_available = |band: BandId| ProductError::BandNotAvailable {
        band,
        product: product.name.clone(),
    };

    for band in requested {
        match band.category() {
            BandCategory::Spectral | BandCategory::Radar => {
                if !band.category().allowed_for(sensor) {
                    return Err(invalid_category(band));
                }
                if !product.has_band(band) {
                    return Err(not_available(band));
                }
                plan.raw_bands.push(band);
            }
            BandCategory::Index => {
                let spec = indices::lookup(band).ok_or_else(|| ProductError::IndexNotComputable {
                    index: band,
                    missing: Vec::new(),
                })?;
                if spec.sensor != sensor {
                    return Err(invalid_category(band));
                }
                let missing: Vec<BandId> = spec
                    .inputs
                    .iter()
                    .copied()
                    .filter(|input| !product.has_band(*input))
                    .collect();
                if !missing.is_empty() {
                    return Err(ProductError::IndexNotComputable { index: band, missing });
                }
                index_inputs.extend_from_slice(spec.inputs);
                plan.indices.push(IndexStep {
                    index: band,
                    inputs: spec.inputs.to_vec(),
                });
            }
            BandCategory::Dem => dem_requested.push(band),
            BandCategory::Cloud => {
                if !band.category().allowed_for(sensor) {
                    return Err(invalid_category(band));
                }
                if !product.has_cloud_band(band) {
                    return Err(not_available(band));
                }
                plan.cloud_bands.push(band);
            }
        }
    }

    for input in index_inputs {
        if !plan.raw_bands.contains(&input) {
            plan.raw_bands.push(input);
        }
    }

    if !dem_requested.is_empty() {
        plan.dem_bands.push(BandId::Dem);
        plan.dem_bands
            .extend(dem_requested.into_iter().filter(|band| *band != BandId::Dem));
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use eo_common::SensorType;
    use product_resolver::{BandMap, FormatId, RawBand};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn descriptor(sensor: SensorType, bands: &[BandId], clouds: &[BandId]) -> ProductDescriptor {
        let band_map: BandMap = bands.iter().map(|b| (*b, RawBand::new(b.as_str(), 10.0))).collect();
        ProductDescriptor {
            path: PathBuf::from("/data/scene"),
            is_archive: false,
            format: if sensor == SensorType::Optical { FormatId::S2 } else { FormatId::S1 },
            sensor_type: sensor,
            name: "scene".to_string(),
            product_type: "L2A".to_string(),
            instrument: "MSI".to_string(),
            constellation_id: "S2A".to_string(),
            acquisition_datetime: NaiveDate::from_ymd_opt(2021, 7, 12)
                .unwrap()
                .and_hms_opt(10, 36, 29)
                .unwrap(),
            default_pixel_size: 10.0,
            band_map,
            cloud_bands: clouds.iter().copied().collect::<BTreeSet<_>>(),
            orbit_direction: None,
            condensed_name: "20210712T103629_S2_L2A".to_string(),
            output_directory: PathBuf::from("/tmp/out"),
        }
    }

    fn optical() -> ProductDescriptor {
        descriptor(
            SensorType::Optical,
            &[BandId::Blue, BandId::Green, BandId::Red, BandId::Nir, BandId::Swir1, BandId::Swir2],
            &[BandId::Clouds],
        )
    }

    #[test]
    fn test_raw_reads_are_unique() {
        let plan = plan(&[BandId::Ndvi, BandId::Red, BandId::Savi, BandId::Red], &optical()).unwrap();
        assert_eq!(plan.requested, vec![BandId::Ndvi, BandId::Red, BandId::Savi]);
        assert_eq!(plan.raw_bands, vec![BandId::Red, BandId::Nir]);
        assert_eq!(plan.indices.len(), 2);
    }

    #[test]
    fn test_plan_covers_index_inputs() {
        let product = optical();
        let requested = [BandId::Evi, BandId::Nbr2, BandId::Ndwi, BandId::Mndwi, BandId::Green];
        let plan = plan(&requested, &product).unwrap();
        for step in &plan.indices {
            let spec = indices::lookup(step.index).unwrap();
            assert!(spec.inputs.iter().all(|input| plan.raw_bands.contains(input)));
        }
    }

    #[test]
    fn test_missing_index_input() {
        let product = descriptor(SensorType::Optical, &[BandId::Red], &[]);
        let err = plan(&[BandId::Ndvi], &product).unwrap_err();
        match err {
            ProductError::IndexNotComputable { index, missing } => {
                assert_eq!(index, BandId::Ndvi);
                assert_eq!(missing, vec![BandId::Nir]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_category_incompatible_with_sensor() {
        let err = plan(&[BandId::Vv], &optical()).unwrap_err();
        assert_eq!(err.kind(), "InvalidBandCategory");

        let sar = descriptor(SensorType::Sar, &[BandId::Vv, BandId::Vh], &[]);
        assert_eq!(plan(&[BandId::Clouds], &sar).unwrap_err().kind(), "InvalidBandCategory");
        assert_eq!(plan(&[BandId::Ndvi], &sar).unwrap_err().kind(), "InvalidBandCategory");
        assert_eq!(plan(&[BandId::Rvi], &optical()).unwrap_err().kind(), "InvalidBandCategory");
        assert!(plan(&[BandId::Rvi, BandId::Dem], &sar).is_ok());
    }

    #[test]
    fn test_band_not_offered() {
        let err = plan(&[BandId::Pan], &optical()).unwrap_err();
        assert_eq!(err.kind(), "BandNotAvailable");

        let err = plan(&[BandId::Cirrus], &optical()).unwrap_err();
        assert_eq!(err.kind(), "BandNotAvailable");
    }

    #[test]
    fn test_dem_first() {
        let plan = plan(&[BandId::Hillshade, BandId::Red, BandId::Slope], &optical()).unwrap();
        assert_eq!(plan.dem_bands, vec![BandId::Dem, BandId::Hillshade, BandId::Slope]);
        assert_eq!(plan.requested_dem_bands(), vec![BandId::Hillshade, BandId::Slope]);
        assert!(plan.needs_elevation());

        let plan = super::plan(&[BandId::Slope, BandId::Dem], &optical()).unwrap();
        assert_eq!(plan.dem_bands, vec![BandId::Dem, BandId::Slope]);
    }

    #[test]
    fn test_cloud_bands() {
        let plan = plan(&[BandId::Clouds], &optical()).unwrap();
        assert_eq!(plan.cloud_bands, vec![BandId::Clouds]);
        assert!(plan.raw_bands.is_empty());
        assert!(!plan.needs_elevation());
    }

    #[test]
    fn test_dedup_preserving_order() {
        let bands = dedup_preserving_order(&[BandId::Nir, BandId::Red, BandId::Nir, BandId::Blue]);
        assert_eq!(bands, vec![BandId::Nir, BandId::Red, BandId::Blue]);
    }
}
