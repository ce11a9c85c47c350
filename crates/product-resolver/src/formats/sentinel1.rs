//! Sentinel-1 SAR products (ESA SAFE layout).

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use eo_common::{BandId, OrbitDirection, ProductResult};
use regex::Regex;

use crate::descriptor::{BandMap, RawBand};
use crate::factory::{ExtractionContext, FormatBehavior};
use crate::metadata::parse_compact_datetime;
use crate::source::SearchDepth;

static SAFE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^S1(?P<unit>[ABCD])_(?P<mode>IW|EW|SM|WV|S\d)_(?P<ptype>RAW|SLC|GRD|OCN)(?P<res>[FHM_])_[0-2]S(?P<polkind>[SD])(?P<pol>[HV])_(?P<start>\d{8}T\d{6})_\d{8}T\d{6}_(?P<orbit>\d{6})_[0-9A-F]{6}_[0-9A-F]{4}(?:_COG)?$",
    )
    .expect("valid Sentinel-1 regex")
});

static MANIFEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^manifest\.safe$").expect("valid manifest regex"));

static PASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:s1:)?pass>\s*(?P<pass>ASCENDING|DESCENDING)\s*</(?:s1:)?pass>")
        .expect("valid pass regex")
});

#[derive(Debug, Clone, PartialEq)]
struct SafeName {
    unit: String,
    mode: String,
    product_type: String,
    resolution: char,
    dual: bool,
    primary_pol: char,
    start: NaiveDateTime,
    orbit: String,
}

impl SafeName {
    /// Canonical (band, despeckled band, raw id) triples for the acquired polarizations.
    fn polarizations(&self) -> Vec<(BandId, BandId, &'static str)> {
        let vv = (BandId::Vv, BandId::VvDspk, "vv");
        let vh = (BandId::Vh, BandId::VhDspk, "vh");
        let hh = (BandId::Hh, BandId::HhDspk, "hh");
        let hv = (BandId::Hv, BandId::HvDspk, "hv");
        match (self.primary_pol, self.dual) {
            ('V', false) => vec![vv],
            ('V', true) => vec![vv, vh],
            ('H', false) => vec![hh],
            _ => vec![hh, hv],
        }
    }

    fn pixel_size(&self) -> f64 {
        match (self.product_type.as_str(), self.resolution) {
            ("GRD", 'M') => 40.0,
            ("GRD", 'H') if self.mode != "IW" => 25.0,
            _ => 10.0,
        }
    }
}

fn parse(ctx: &ExtractionContext<'_>) -> ProductResult<SafeName> {
    let name = ctx.name()?;
    let caps = SAFE_NAME
        .captures(name)
        .ok_or_else(|| ctx.invalid(format!("not a Sentinel-1 product name: {}", name)))?;
    let start = parse_compact_datetime(&caps["start"])
        .ok_or_else(|| ctx.invalid(format!("invalid start time: {}", &caps["start"])))?;

    Ok(SafeName {
        unit: caps["unit"].to_string(),
        mode: caps["mode"].to_string(),
        product_type: caps["ptype"].to_string(),
        resolution: caps["res"].chars().next().unwrap_or('_'),
        dual: &caps["polkind"] == "D",
        primary_pol: caps["pol"].chars().next().unwrap_or('V'),
        start,
        orbit: caps["orbit"].to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sentinel1Behavior;

impl FormatBehavior for Sentinel1Behavior {
    fn name(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        let name = ctx.source.product_name();
        Ok(name.strip_suffix(".SAFE").unwrap_or(&name).to_string())
    }

    fn datetime(&self, ctx: &ExtractionContext<'_>) -> ProductResult<NaiveDateTime> {
        Ok(parse(ctx)?.start)
    }

    fn constellation_id(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(format!("S1{}", parse(ctx)?.unit))
    }

    fn instrument(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok("SAR-C".to_string())
    }

    fn product_type(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(parse(ctx)?.product_type)
    }

    fn default_pixel_size(&self, ctx: &ExtractionContext<'_>) -> ProductResult<f64> {
        Ok(parse(ctx)?.pixel_size())
    }

    fn band_map(&self, ctx: &ExtractionContext<'_>) -> ProductResult<BandMap> {
        let parsed = parse(ctx)?;
        let gsd = ctx.pixel_size()?;
        let mut map = BandMap::new();
        for (band, despeckled, raw_id) in parsed.polarizations() {
            map.insert(band, RawBand::new(raw_id, gsd))?;
            map.insert(despeckled, RawBand::new(raw_id, gsd))?;
        }
        Ok(map)
    }

    fn disambiguator(&self, ctx: &ExtractionContext<'_>) -> ProductResult<Option<String>> {
        let parsed = parse(ctx)?;
        Ok(Some(format!("{}_{}", parsed.mode, parsed.orbit)))
    }

    /// Read from `manifest.safe` when present; the name does not carry it.
    fn orbit_direction(&self, ctx: &ExtractionContext<'_>) -> ProductResult<Option<OrbitDirection>> {
        let Some(member) = ctx.source.find(&MANIFEST, SearchDepth::Exactly(0))? else {
            return Ok(None);
        };
        let manifest = ctx.source.read_to_string(&member)?;
        Ok(PASS.captures(&manifest).map(|caps| match &caps["pass"] {
            "ASCENDING" => OrbitDirection::Ascending,
            _ => OrbitDirection::Descending,
        }))
    }
}
