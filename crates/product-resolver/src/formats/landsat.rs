//! Landsat 1-9 (MSS, TM, ETM+, OLI, TIRS), collection and pre-collection names.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use eo_common::{BandId, OrbitDirection, ProductResult};
use regex::Regex;
use tracing::debug;

use super::optical_band;
use crate::descriptor::BandMap;
use crate::factory::{ExtractionContext, FormatBehavior};
use crate::metadata::{odl_value, parse_compact_date, parse_time_of_day, parse_year_doy};
use crate::source::SearchDepth;

static COLLECTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^L(?P<sensor>[OTCEM])(?P<mission>\d{2})_(?P<level>L1(?:GT|SP|TP|GS)|L2(?:SP|SR))_(?P<pathrow>\d{6})_(?P<acq>\d{8})_\d{8}_\d{2}_(?:RT|T1|T2)$",
    )
    .expect("valid Landsat collection regex")
});

static PRE_COLLECTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^L(?P<sensor>[OTCEM])(?P<mission>\d)(?P<pathrow>\d{6})(?P<year>\d{4})(?P<doy>\d{3})[A-Z]{3}\d{2}$",
    )
    .expect("valid Landsat pre-collection regex")
});

static MTL_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+_MTL\.txt$").expect("valid MTL regex"));

/// Fields decoded from a Landsat product name.
#[derive(Debug, Clone, PartialEq)]
pub struct LandsatName {
    pub sensor: char,
    pub mission: u8,
    /// Processing level; `None` for pre-collection products
    pub level: Option<String>,
    pub path_row: String,
    pub acquisition_date: NaiveDateTime,
}

impl LandsatName {
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(caps) = COLLECTION_NAME.captures(name) {
            return Some(Self {
                sensor: caps["sensor"].chars().next()?,
                mission: caps["mission"].parse().ok()?,
                level: Some(caps["level"].to_string()),
                path_row: caps["pathrow"].to_string(),
                acquisition_date: parse_compact_date(&caps["acq"])?,
            });
        }

        let caps = PRE_COLLECTION_NAME.captures(name)?;
        Some(Self {
            sensor: caps["sensor"].chars().next()?,
            mission: caps["mission"].parse().ok()?,
            level: None,
            path_row: caps["pathrow"].to_string(),
            acquisition_date: parse_year_doy(&caps["year"], &caps["doy"])?,
        })
    }

    pub fn instrument(&self) -> Instrument {
        match (self.sensor, self.mission) {
            ('M', _) => Instrument::Mss,
            ('T', m) if m < 8 => Instrument::Tm,
            ('E', _) => Instrument::Etm,
            ('O', _) => Instrument::Oli,
            ('T', _) => Instrument::Tirs,
            _ => Instrument::OliTirs,
        }
    }

    fn is_surface_reflectance(&self) -> bool {
        self.level.as_deref().is_some_and(|l| l.starts_with("L2"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    Mss,
    Tm,
    Etm,
    Oli,
    Tirs,
    OliTirs,
}

impl Instrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Mss => "MSS",
            Instrument::Tm => "TM",
            Instrument::Etm => "ETM+",
            Instrument::Oli => "OLI",
            Instrument::Tirs => "TIRS",
            Instrument::OliTirs => "OLI-TIRS",
        }
    }

    fn has_oli(&self) -> bool {
        matches!(self, Instrument::Oli | Instrument::OliTirs)
    }

    fn has_tirs(&self) -> bool {
        matches!(self, Instrument::Tirs | Instrument::OliTirs)
    }
}

/// Behavior shared by every Landsat mission.
#[derive(Debug, Clone, Copy, Default)]
pub struct LandsatBehavior;

impl LandsatBehavior {
    fn parsed(&self, ctx: &ExtractionContext<'_>) -> ProductResult<LandsatName> {
        let name = ctx.name()?;
        LandsatName::parse(name).ok_or_else(|| ctx.invalid(format!("not a Landsat product name: {}", name)))
    }

    /// Acquisition time from the MTL file, when the product ships one.
    fn mtl_datetime(&self, ctx: &ExtractionContext<'_>) -> ProductResult<Option<NaiveDateTime>> {
        let Some(member) = ctx.source.find(&MTL_FILE, SearchDepth::Exactly(0))? else {
            return Ok(None);
        };
        let text = ctx.source.read_to_string(&member)?;
        let date = odl_value(&text, "DATE_ACQUIRED")
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let time = odl_value(&text, "SCENE_CENTER_TIME").and_then(parse_time_of_day);

        Ok(match (date, time) {
            (Some(d), Some(t)) => Some(d.and_time(t)),
            _ => {
                debug!(member = %member, "MTL file lacks acquisition time");
                None
            }
        })
    }
}

impl FormatBehavior for LandsatBehavior {
    fn datetime(&self, ctx: &ExtractionContext<'_>) -> ProductResult<NaiveDateTime> {
        match self.mtl_datetime(ctx)? {
            Some(dt) => Ok(dt),
            None => Ok(self.parsed(ctx)?.acquisition_date),
        }
    }

    fn constellation_id(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(format!("L{}", self.parsed(ctx)?.mission))
    }

    fn instrument(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(self.parsed(ctx)?.instrument().as_str().to_string())
    }

    fn product_type(&self, ctx: &ExtractionContext<'_>) -> ProductResult<String> {
        Ok(self.parsed(ctx)?.level.unwrap_or_else(|| "L1".to_string()))
    }

    fn default_pixel_size(&self, ctx: &ExtractionContext<'_>) -> ProductResult<f64> {
        Ok(match self.parsed(ctx)?.instrument() {
            Instrument::Mss => 60.0,
            Instrument::Tirs => 100.0,
            _ => 30.0,
        })
    }

    fn band_map(&self, ctx: &ExtractionContext<'_>) -> ProductResult<BandMap> {
        let parsed = self.parsed(ctx)?;
        let sr = parsed.is_surface_reflectance();
        let refl = |n: u8| if sr { format!("SR_B{}", n) } else { format!("B{}", n) };
        let thermal = |n: u8| if sr { format!("ST_B{}", n) } else { format!("B{}", n) };

        let mut map = BandMap::new();
        match parsed.instrument() {
            Instrument::Mss => {
                // MSS bands are numbered 4-7 on Landsat 1-3 and 1-4 afterwards
                let first = if parsed.mission <= 3 { 4 } else { 1 };
                map.insert(BandId::Green, optical_band(format!("B{}", first), 60.0, 500.0, 600.0))?;
                map.insert(BandId::Red, optical_band(format!("B{}", first + 1), 60.0, 600.0, 700.0))?;
                map.insert(BandId::Vre1, optical_band(format!("B{}", first + 2), 60.0, 700.0, 800.0))?;
                map.insert(BandId::Nir, optical_band(format!("B{}", first + 3), 60.0, 800.0, 1100.0))?;
            }
            Instrument::Tm | Instrument::Etm => {
                let etm = parsed.instrument() == Instrument::Etm;
                map.insert(BandId::Blue, optical_band(refl(1), 30.0, 450.0, 520.0))?;
                map.insert(BandId::Green, optical_band(refl(2), 30.0, 520.0, 600.0))?;
                map.insert(BandId::Red, optical_band(refl(3), 30.0, 630.0, 690.0))?;
                map.insert(BandId::Nir, optical_band(refl(4), 30.0, 770.0, 900.0))?;
                map.insert(BandId::Swir1, optical_band(refl(5), 30.0, 1550.0, 1750.0))?;
                map.insert(BandId::Swir2, optical_band(refl(7), 30.0, 2090.0, 2350.0))?;
                if etm && !sr {
                    map.insert(BandId::Tir1, optical_band("B6_VCID_1", 60.0, 10400.0, 12500.0))?;
                    map.insert(BandId::Tir2, optical_band("B6_VCID_2", 60.0, 10400.0, 12500.0))?;
                    map.insert(BandId::Pan, optical_band("B8", 15.0, 520.0, 900.0))?;
                } else {
                    map.insert(BandId::Tir1, optical_band(thermal(6), 30.0, 10400.0, 12500.0))?;
                }
            }
            instrument => {
                if instrument.has_oli() {
                    map.insert(BandId::CoastalAerosol, optical_band(refl(1), 30.0, 430.0, 450.0))?;
                    map.insert(BandId::Blue, optical_band(refl(2), 30.0, 450.0, 510.0))?;
                    map.insert(BandId::Green, optical_band(refl(3), 30.0, 530.0, 590.0))?;
                    map.insert(BandId::Red, optical_band(refl(4), 30.0, 640.0, 670.0))?;
                    map.insert(BandId::Nir, optical_band(refl(5), 30.0, 850.0, 880.0))?;
                    map.insert(BandId::Swir1, optical_band(refl(6), 30.0, 1570.0, 1650.0))?;
                    map.insert(BandId::Swir2, optical_band(refl(7), 30.0, 2110.0, 2290.0))?;
                    if !sr {
                        map.insert(BandId::Pan, optical_band("B8", 15.0, 500.0, 680.0))?;
                        map.insert(BandId::SwirCirrus, optical_band("B9", 30.0, 1360.0, 1380.0))?;
                    }
                }
                if instrument.has_tirs() {
                    map.insert(BandId::Tir1, optical_band(thermal(10), 100.0, 10600.0, 11190.0))?;
                    if !sr {
                        map.insert(BandId::Tir2, optical_band("B11", 100.0, 11500.0, 12510.0))?;
                    }
                }
            }
        }
        Ok(map)
    }

    fn disambiguator(&self, ctx: &ExtractionContext<'_>) -> ProductResult<Option<String>> {
        Ok(Some(self.parsed(ctx)?.path_row))
    }

    fn orbit_direction(&self, _ctx: &ExtractionContext<'_>) -> ProductResult<Option<OrbitDirection>> {
        // Daytime scenes are acquired on the descending node
        Ok(Some(OrbitDirection::Descending))
    }

    fn has_cloud_band(&self, ctx: &ExtractionContext<'_>, band: BandId) -> bool {
        // Quality bands only ship with collection products
        let Ok(parsed) = self.parsed(ctx) else {
            return false;
        };
        if parsed.level.is_none() {
            return false;
        }
        match band {
            BandId::RawClouds | BandId::Clouds | BandId::AllClouds => true,
            BandId::Shadows => parsed.instrument() != Instrument::Mss,
            BandId::Cirrus => parsed.instrument().has_oli(),
            _ => false,
        }
    }
}
