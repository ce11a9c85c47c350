//! Format identifiers and the ordered table of recognition rules.
//!
//! Rule order is significant: the resolver walks the table top to bottom
//! and the first match wins, so specific rules are listed before generic
//! ones (SkySat before PlanetScope, Landsat 9 before Landsat 8...).

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use eo_common::{ProductError, ProductResult, SensorType};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::source::SearchDepth;

macro_rules! format_ids {
    ($($variant:ident => ($code:literal, $name:literal, $sensor:ident)),+ $(,)?) => {
        /// Identifier of a supported product format.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FormatId {
            $($variant),+
        }

        impl FormatId {
            /// Every format, in declaration order.
            pub const ALL: &'static [FormatId] = &[$(FormatId::$variant),+];

            /// Short code used in condensed names (`"L8"`, `"S2"`, `"S1"`...).
            pub fn code(&self) -> &'static str {
                match self {
                    $(FormatId::$variant => $code),+
                }
            }

            /// Human-readable constellation name.
            pub fn name(&self) -> &'static str {
                match self {
                    $(FormatId::$variant => $name),+
                }
            }

            pub fn sensor_type(&self) -> SensorType {
                match self {
                    $(FormatId::$variant => SensorType::$sensor),+
                }
            }
        }
    };
}

format_ids! {
    S2 => ("S2", "Sentinel-2", Optical),
    S2Theia => ("S2_THEIA", "Sentinel-2 Theia", Optical),
    S3Olci => ("S3_OLCI", "Sentinel-3 OLCI", Optical),
    S3Slstr => ("S3_SLSTR", "Sentinel-3 SLSTR", Optical),
    Hls => ("HLS", "Harmonized Landsat Sentinel-2", Optical),
    L9 => ("L9", "Landsat-9", Optical),
    L8 => ("L8", "Landsat-8", Optical),
    L7 => ("L7", "Landsat-7", Optical),
    L5 => ("L5", "Landsat-5", Optical),
    L4 => ("L4", "Landsat-4", Optical),
    L3 => ("L3", "Landsat-3", Optical),
    L2 => ("L2", "Landsat-2", Optical),
    L1 => ("L1", "Landsat-1", Optical),
    SkySat => ("SKY", "SkySat", Optical),
    PlanetScope => ("PLA", "PlanetScope", Optical),
    RapidEye => ("RE", "RapidEye", Optical),
    PleiadesNeo => ("PNEO", "Pleiades-Neo", Optical),
    Pleiades => ("PLD", "Pleiades", Optical),
    Spot7 => ("SPOT7", "SPOT-7", Optical),
    Spot6 => ("SPOT6", "SPOT-6", Optical),
    Vision1 => ("VIS1", "Vision-1", Optical),
    Maxar => ("MAXAR", "Maxar", Optical),
    Geosat2 => ("GS2", "GEOSAT-2", Optical),
    S1 => ("S1", "Sentinel-1", Sar),
    CosmoSkyMed => ("CSK", "COSMO-SkyMed", Sar),
    CosmoSkyMed2 => ("CSG", "COSMO-SkyMed Second Generation", Sar),
    TerraSarX => ("TSX", "TerraSAR-X", Sar),
    TanDemX => ("TDX", "TanDEM-X", Sar),
    Paz => ("PAZ", "PAZ", Sar),
    Radarsat2 => ("RS2", "RADARSAT-2", Sar),
    RadarsatCm => ("RCM", "RADARSAT Constellation Mission", Sar),
    Iceye => ("ICEYE", "ICEYE", Sar),
    Saocom => ("SAOCOM", "SAOCOM-1", Sar),
    Capella => ("CAPELLA", "Capella", Sar),
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FormatId {
    type Err = ProductError;

    /// Case-insensitive lookup by code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FormatId::ALL
            .iter()
            .copied()
            .find(|f| f.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProductError::Registry(format!("unknown format: {}", s)))
    }
}

impl Serialize for FormatId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for FormatId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Rules
// ============================================================================

/// One alternative way of recognizing a product by its name.
///
/// `outer` must match the whole product name. When `inner` is set, at least
/// one immediate child of the product must also match it (used for formats
/// whose folder names are not distinctive, such as COSMO-SkyMed).
#[derive(Debug, Clone)]
pub struct NamePatternSet {
    pub outer: Regex,
    pub inner: Option<Regex>,
}

/// Recognition rule for one format.
#[derive(Debug, Clone)]
pub struct FormatRule {
    pub format: FormatId,
    /// Alternatives: the name check passes if any set matches.
    pub name_patterns: Vec<NamePatternSet>,
    /// All of these must match some member at `search_depth`.
    pub metadata_patterns: Vec<Regex>,
    pub search_depth: SearchDepth,
}

impl FormatRule {
    pub fn builder(format: FormatId) -> FormatRuleBuilder {
        FormatRuleBuilder {
            format,
            name_patterns: Vec::new(),
            metadata_patterns: Vec::new(),
            search_depth: SearchDepth::default(),
        }
    }
}

/// Builder compiling anchored patterns into a [`FormatRule`].
#[derive(Debug, Clone)]
pub struct FormatRuleBuilder {
    format: FormatId,
    name_patterns: Vec<(String, Option<String>)>,
    metadata_patterns: Vec<String>,
    search_depth: SearchDepth,
}

impl FormatRuleBuilder {
    /// Add a name alternative matched against the full product name.
    pub fn name(mut self, outer: &str) -> Self {
        self.name_patterns.push((outer.to_string(), None));
        self
    }

    /// Add a name alternative that also requires a matching immediate child.
    pub fn name_with_child(mut self, outer: &str, inner: &str) -> Self {
        self.name_patterns
            .push((outer.to_string(), Some(inner.to_string())));
        self
    }

    /// Add a metadata file pattern matched against member file names.
    pub fn metadata(mut self, pattern: &str) -> Self {
        self.metadata_patterns.push(pattern.to_string());
        self
    }

    /// Nesting level of the metadata files (-1 = anywhere).
    pub fn depth(mut self, level: i32) -> Self {
        self.search_depth = SearchDepth::from_nesting(level);
        self
    }

    pub fn build(self) -> ProductResult<FormatRule> {
        let format = self.format;
        let name_patterns = self
            .name_patterns
            .iter()
            .map(|(outer, inner)| {
                Ok(NamePatternSet {
                    outer: compile_anchored(format, outer)?,
                    inner: inner
                        .as_deref()
                        .map(|p| compile_anchored(format, p))
                        .transpose()?,
                })
            })
            .collect::<ProductResult<Vec<_>>>()?;

        let metadata_patterns = self
            .metadata_patterns
            .iter()
            .map(|p| compile_anchored(format, p))
            .collect::<ProductResult<Vec<_>>>()?;

        Ok(FormatRule {
            format,
            name_patterns,
            metadata_patterns,
            search_depth: self.search_depth,
        })
    }
}

fn compile_anchored(format: FormatId, pattern: &str) -> ProductResult<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| ProductError::Registry(format!("{}: invalid pattern {:?}: {}", format, pattern, e)))
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered, immutable table of format rules.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    rules: Vec<FormatRule>,
}

static BUILTIN: LazyLock<Arc<FormatRegistry>> = LazyLock::new(|| {
    Arc::new(
        builtin_rules()
            .and_then(FormatRegistry::new)
            .expect("built-in format rules must compile"),
    )
});

impl FormatRegistry {
    /// Validate and wrap a rule list.
    ///
    /// # Errors
    ///
    /// [`ProductError::Registry`] if a format appears twice or a rule has no
    /// name pattern.
    pub fn new(rules: Vec<FormatRule>) -> ProductResult<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.format) {
                return Err(ProductError::Registry(format!(
                    "duplicate rule for {}",
                    rule.format
                )));
            }
            if rule.name_patterns.is_empty() {
                return Err(ProductError::Registry(format!(
                    "{} has no name pattern",
                    rule.format
                )));
            }
        }
        Ok(Self { rules })
    }

    /// The shared built-in registry.
    pub fn builtin() -> Arc<FormatRegistry> {
        Arc::clone(&BUILTIN)
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[FormatRule] {
        &self.rules
    }

    pub fn get(&self, format: FormatId) -> Option<&FormatRule> {
        self.rules.iter().find(|r| r.format == format)
    }

    pub fn formats(&self) -> impl Iterator<Item = FormatId> + '_ {
        self.rules.iter().map(|r| r.format)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Landsat collection name: sensor letters, two-digit mission, levels and tiers.
fn landsat_collection(sensors: &str, mission: &str, levels: &str, tiers: &str) -> String {
    format!(
        r"L[{}]{}_(?:{})_\d{{6}}_\d{{8}}_\d{{8}}_\d{{2}}_(?:{})",
        sensors, mission, levels, tiers
    )
}

/// Landsat pre-collection name, e.g. `LC80230302020139LGN00`.
fn landsat_pre_collection(sensors: &str, mission: &str) -> String {
    format!(r"L[{}]{}\d{{13}}[A-Z]{{3}}\d{{2}}", sensors, mission)
}

fn landsat_rule(format: FormatId, sensors: &str, mission: u8, levels: &str, tiers: &str) -> ProductResult<FormatRule> {
    let collection = landsat_collection(sensors, &format!("{:02}", mission), levels, tiers);
    let pre = landsat_pre_collection(sensors, &mission.to_string());
    FormatRule::builder(format)
        .name(&collection)
        .name(&pre)
        .metadata(&format!(r"(?:{}|{})_MTL\.(?:txt|xml)", collection, pre))
        .depth(0)
        .build()
}

fn builtin_rules() -> ProductResult<Vec<FormatRule>> {
    let l2 = "L1(?:GT|SP|TP|GS)|L2(?:SP|SR)";
    let mss = "L1(?:TP|GS)";
    let dimap_modes = "P|MS|PMS|MS-N|MS-X|PMS-N|PMS-X";

    Ok(vec![
        // --- Optical ---
        FormatRule::builder(FormatId::S2)
            .name(r"S2[ABCD]_MSIL(?:1C|2A)_\d{8}T\d{6}_N\d{4}_R\d{3}_T\d{2}[A-Z]{3}_\d{8}T\d{6}(?:\.SAFE)?")
            .metadata(r"MTD_MSIL(?:1C|2A)\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::S2Theia)
            .name(r"SENTINEL2[ABCD]_\d{8}-\d{6}-\d{3}_L(?:2A|1C)_T\d{2}[A-Z]{3}_[CDH](?:_V\d-\d)?")
            .metadata(r"SENTINEL2[ABCD]_\d{8}-\d{6}-\d{3}_L(?:2A|1C)_T\d{2}[A-Z]{3}_[CDH](?:_V\d-\d)?_MTD_ALL\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::S3Olci)
            .name(r"S3[AB]_OL_[012]_\w{6}_\d{8}T\d{6}_\d{8}T\d{6}_\d{8}T\d{6}_\w{17}_\w{3}_[OFDR]_(?:NR|ST|NT)_\d{3}(?:\.SEN3)?")
            .metadata(r"xfdumanifest\.xml")
            .metadata(r"Oa\d{2}_radiance\.nc")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::S3Slstr)
            .name(r"S3[AB]_SL_[012]_\w{6}_\d{8}T\d{6}_\d{8}T\d{6}_\d{8}T\d{6}_\w{17}_\w{3}_[OFDR]_(?:NR|ST|NT)_\d{3}(?:\.SEN3)?")
            .metadata(r"xfdumanifest\.xml")
            .metadata(r"S\d_radiance_an\.nc")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Hls)
            .name(r"HLS\.[LS]30\.T\d{2}[A-Z]{3}\.\d{7}T\d{6}\.v2\.0")
            .metadata(r"HLS\.[LS]30\.T\d{2}[A-Z]{3}\.\d{7}T\d{6}\.v2\.0\.cmr\.xml")
            .depth(0)
            .build()?,
        landsat_rule(FormatId::L9, "OTC", 9, l2, "RT|T1|T2")?,
        landsat_rule(FormatId::L8, "OTC", 8, l2, "RT|T1|T2")?,
        landsat_rule(FormatId::L7, "E", 7, l2, "RT|T1|T2")?,
        landsat_rule(FormatId::L5, "TM", 5, l2, "T1|T2")?,
        landsat_rule(FormatId::L4, "TM", 4, l2, "T1|T2")?,
        landsat_rule(FormatId::L3, "M", 3, mss, "T2")?,
        landsat_rule(FormatId::L2, "M", 2, mss, "T2")?,
        landsat_rule(FormatId::L1, "M", 1, mss, "T2")?,
        FormatRule::builder(FormatId::SkySat)
            .name(r"\d{8}_\d{6}_ss[cd]\d{1,2}(?:d\d)?_\d{4}")
            .metadata(r".*_metadata\.json")
            .depth(-1)
            .build()?,
        FormatRule::builder(FormatId::PlanetScope)
            .name(r"\d{8}_\d{6}(?:_\d{2})?_[0-9a-f]{4}")
            .metadata(r"\d{8}_\d{6}(?:_\d{2})?_[0-9a-f]{4}_[13][AB]_.*metadata.*\.xml")
            .metadata(r"\d{8}_\d{6}(?:_\d{2})?_[0-9a-f]{4}_[13][AB]_(?:Analytic|Visual).*\.tif")
            .depth(-1)
            .build()?,
        FormatRule::builder(FormatId::RapidEye)
            .name(r"\d{4}-\d{2}-\d{2}T\d{6}_RE\d_\d[AB]-NAC_\d{7,}_\d{6}")
            .metadata(r".*_metadata\.xml")
            .depth(-1)
            .build()?,
        FormatRule::builder(FormatId::PleiadesNeo)
            .name(r"IMG_\d+_PNEO\d_(?:P|MS|PMS|MS-FS|PMS-FS)")
            .metadata(r"DIM_PNEO\d_\d{15}_(?:P|MS|PMS|MS-FS|PMS-FS)_(?:SEN|PRJ|ORT|MOS)_.+\.XML")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Pleiades)
            .name(&format!(r"IMG_PHR1[AB]_(?:{})_\d{{3}}", dimap_modes))
            .metadata(&format!(r"DIM_PHR1[AB]_(?:{})_\d{{15}}_(?:SEN|PRJ|ORT|MOS)_.+\.XML", dimap_modes))
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Spot7)
            .name(&format!(r"IMG_SPOT7_(?:{})_\d{{3}}_[A-Z]", dimap_modes))
            .metadata(&format!(r"DIM_SPOT7_(?:{})_\d{{15}}_(?:SEN|PRJ|ORT|MOS)_.+\.XML", dimap_modes))
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Spot6)
            .name(&format!(r"IMG_SPOT6_(?:{})_\d{{3}}_[A-Z]", dimap_modes))
            .metadata(&format!(r"DIM_SPOT6_(?:{})_\d{{15}}_(?:SEN|PRJ|ORT|MOS)_.+\.XML", dimap_modes))
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Vision1)
            .name(r"VIS1_(?:PAN|BUN|PSH|MS4)_.+_\d{2}-\d")
            .metadata(r"VIS1_(?:PAN|BUN|PSH|MS4)_.+\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Maxar)
            .name(r"\d{12}_\d{2}_P\d{3}_(?:MUL|PAN|PSH|MOS)")
            .metadata(r"\d{2}[A-Z]{3}\d{8}-.+\.XML")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Geosat2)
            .name(r"DE2_(?:PM4|PSH|PS3|PS4|MS4|PAN)_L1[A-D]_\d{6}_\d{8}T\d{6}_\d{8}T\d{6}_DE2_\d{5}_[0-9A-F]{4}")
            .metadata(r"DE2_(?:PM4|PSH|PS3|PS4|MS4|PAN)_L1[A-D]_.+\.dim")
            .depth(0)
            .build()?,
        // --- SAR ---
        FormatRule::builder(FormatId::S1)
            .name(r"S1[ABCD]_(?:IW|EW|SM|WV|S\d)_(?:RAW|SLC|GRD|OCN)[FHM_]_[0-2]S[SD][HV]_\d{8}T\d{6}_\d{8}T\d{6}_\d{6}_[0-9A-F]{6}_[0-9A-F]{4}(?:_COG)?(?:\.SAFE)?")
            .metadata(r"s1[abcd]-(?:iw|ew|sm|wv|s\d)\d*-(?:raw|slc|grd|ocn)-[hv]{2}-\d{8}t\d{6}-\d{8}t\d{6}-\d{6}-[0-9a-f]{6}-\d{3}\.xml")
            .depth(1)
            .build()?,
        FormatRule::builder(FormatId::CosmoSkyMed)
            .name_with_child(
                r".+",
                r"CSKS[1-4]_(?:RAW|SCS|DGM|GEC|GTC)_[UB]_(?:HI|PP|WR|HR|S2)_\w{2}_(?:HH|VV|VH|HV|CO|CH|CV)_[LR][AD]_[FS][NF]_\d{14}_\d{14}\.h5",
            )
            .metadata(r"DFDN_CSKS[1-4]_.+\.h5\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::CosmoSkyMed2)
            .name_with_child(r".+", r"CSG_SSAR\d_(?:RAW|SCS|DGM|GEC|GTC)_.+\.h5")
            .metadata(r"DFDN_CSG_SSAR\d_.+\.h5\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::TerraSarX)
            .name(r"TSX1_SAR__(?:SSC|MGD|GEC|EEC)_(?:[SR]E|__)___[SH][MCLS]_[SDTQ]_[SD]RA_\d{8}T\d{6}_\d{8}T\d{6}")
            .metadata(r"TSX1_SAR__(?:SSC|MGD|GEC|EEC)_.+\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::TanDemX)
            .name(r"TDX1_SAR__(?:SSC|MGD|GEC|EEC)_(?:[SR]E|__)___[SH][MCLS]_[SDTQ]_[SD]RA_\d{8}T\d{6}_\d{8}T\d{6}")
            .metadata(r"TDX1_SAR__(?:SSC|MGD|GEC|EEC)_.+\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Paz)
            .name(r"PAZ1_SAR__(?:SSC|MGD|GEC|EEC)_(?:[SR]E|__)___[SH][MCLS]_[SDTQ]_[SD]RA_\d{8}T\d{6}_\d{8}T\d{6}")
            .metadata(r"PAZ1_SAR__(?:SSC|MGD|GEC|EEC)_.+\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Radarsat2)
            .name(r"RS2_(?:OK\d+_PK\d+_DK\d+_.{2,}_\d{8}_\d{6}|\d{8}_\d{6}_\d{4}_.{1,5})(?:_(?:HH|VV|VH|HV)){1,4}_S(?:LC|GF|GX)(?:_\d{6}_\d{4}_\d{8})?")
            .metadata(r"product\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::RadarsatCm)
            .name(r"RCM\d_OK\d+_PK\d+_\d_.{4,}_\d{8}_\d{6}(?:_(?:HH|VV|VH|HV|RV|RH)){1,4}_(?:SLC|GRC|GRD|GCC|GCD|NRB)")
            .metadata(r"product\.xml")
            .depth(1)
            .build()?,
        FormatRule::builder(FormatId::Iceye)
            .name(r"(?:CROP_OK\d+_PK\d+_)?ICEYE_(?:X\d+_)?(?:SLC|GRD|SLH|GRDH)_.+")
            .metadata(r"ICEYE_.+\.xml")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Saocom)
            .name(r".+EOL1[ABCD]SARSAO1[AB]\d+(?:-product)?")
            .metadata(r"S1[AB]_OPER_SAR_EOSSP__CORE_L1[A-D]_OL(?:F|VF)_\d{8}T\d{6}\.xemt")
            .depth(0)
            .build()?,
        FormatRule::builder(FormatId::Capella)
            .name(r"CAPELLA_C\d{2}_(?:SP|SM|SS)_(?:SLC|GEO|GEC|SICD|SIDD|CPHD)_(?:HH|VV)_\d{14}_\d{14}")
            .metadata(r"CAPELLA_C\d{2}_(?:SP|SM|SS)_(?:SLC|GEO|GEC|SICD|SIDD|CPHD)_(?:HH|VV)_\d{14}_\d{14}(?:_extended)?\.json")
            .depth(0)
            .build()?,
    ])
}
