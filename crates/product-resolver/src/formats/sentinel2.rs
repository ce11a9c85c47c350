//! Sentinel-2 MSI L1C and L2A (ESA SAFE layout).

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use eo_common::{BandId, OrbitDirection, ProductResult};
use regex::Regex;

use super::optical_band;
use crate::descriptor::BandMap;
use crate::factory::{ExtractionContext, FormatBehavior};
use crate::metadata::parse_compact_datetime;

static SAFE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^S2(?P<unit>[ABCD])_MSIL(?P<level>1C|2A)_(?P<dt>\d{8}T\d{6})_N\d{4}_R(?P<orbit>\d{3})_(?P<tile>T\d{2}[A-Z]{3})_\d{8}T\d{6}$",
    )
    .expect("valid Sentinel-2 regex")
});

#[derive(Debug, Clone, PartialEq)]
struct SafeName {
    unit: String,
    level: String,
    datetime: NaiveDateTime,
    tile: String,
}

fn parse(ctx: &ExtractionContext<'_>) -> ProductResult<SafeName> {
    let name = ctx.name()?;
    let caps = SAFE_NAME
        .captures(name)
        .ok_or_else(|| ctx.invalid(format!("not a Sentinel-2 product name: {}", name)))?;
    let datetime = parse_compact_datetime(&caps["dt"])
        .ok_or_else(|| ctx.invalid(format!("invalid sensing time: {}", &caps["dt"])))?;
    Ok(SafeName {
        unit: caps["unit"].to_string(),
        level: caps["level"].to_string(),
        datetime,
        tile: caps["tile"].to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sentinel2Behavior;

impl FormatBehavior for Sentinel2Behavior {
    fn name(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        let name = ctx.source.product_name();
        Ok(name.strip_suffix(".SAFE").unwrap_or(&name).to_string())
    }

    fn datetime(&self, ctx: &ExtractionContext<'_>) -> ProductResult<NaiveDateTime> {
        Ok(parse(ctx)?.datetime)
    }

    fn constellation_id(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(format!("S2{}", parse(ctx)?.unit))
    }

    fn instrument(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok("MSI".to_string())
    }

    fn product_type(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(format!("L{}", parse(ctx)?.level))
    }

    fn default_pixel_size(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<f64> {
        Ok(10.0)
    }

    fn band_map(&self, ctx: &ExtractionContext<'_>) -> ProductResult<BandMap> {
        let l1c = ctx.product_type()? == "L1C";

        let mut map = BandMap::new();
        map.insert(BandId::CoastalAerosol, optical_band("B01", 60.0, 433.0, 453.0))?;
        map.insert(BandId::Blue, optical_band("B02", 10.0, 458.0, 523.0))?;
        map.insert(BandId::Green, optical_band("B03", 10.0, 543.0, 578.0))?;
        map.insert(BandId::Red, optical_band("B04", 10.0, 650.0, 680.0))?;
        map.insert(BandId::Vre1, optical_band("B05", 20.0, 698.0, 713.0))?;
        map.insert(BandId::Vre2, optical_band("B06", 20.0, 733.0, 748.0))?;
        map.insert(BandId::Vre3, optical_band("B07", 20.0, 773.0, 793.0))?;
        map.insert(BandId::Nir, optical_band("B08", 10.0, 785.0, 900.0))?;
        map.insert(BandId::NarrowNir, optical_band("B8A", 20.0, 855.0, 875.0))?;
        map.insert(BandId::WaterVapour, optical_band("B09", 60.0, 935.0, 955.0))?;
        if l1c {
            // Cirrus is dropped by atmospheric correction
            map.insert(BandId::SwirCirrus, optical_band("B10", 60.0, 1360.0, 1390.0))?;
        }
        map.insert(BandId::Swir1, optical_band("B11", 20.0, 1565.0, 1655.0))?;
        map.insert(BandId::Swir2, optical_band("B12", 20.0, 2100.0, 2280.0))?;
        Ok(map)
    }

    fn disambiguator(&self, ctx: &ExtractionContext<'_>) -> ProductResult<Option<String>> {
        Ok(Some(parse(ctx)?.tile))
    }

    fn orbit_direction(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<Option<OrbitDirection>> {
        Ok(Some(OrbitDirection::Descending))
    }

    fn has_cloud_band(&self, _ctx: &ExtractionContext<'_>, band: BandId) -> bool {
        matches!(
            band,
            BandId::RawClouds | BandId::Clouds | BandId::Cirrus | BandId::AllClouds
        )
    }
}
