//! Canonical band vocabulary.
//!
//! Callers never ask a product for "B04" or "SR_B4": they ask for
//! [`BandId::Red`] and each product maps that onto its own raw identifier.
//! The vocabulary is fixed and covers raw optical and radar bands, the
//! DEM-derived pseudo-bands, cloud bands and the named spectral indices.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Broad family of sensor that captured a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorType {
    /// Passive multispectral / panchromatic imagery
    Optical,
    /// Synthetic aperture radar
    Sar,
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorType::Optical => write!(f, "OPTICAL"),
            SensorType::Sar => write!(f, "SAR"),
        }
    }
}

/// Satellite pass direction at acquisition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

impl fmt::Display for OrbitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrbitDirection::Ascending => write!(f, "ASCENDING"),
            OrbitDirection::Descending => write!(f, "DESCENDING"),
        }
    }
}

/// Static classification of a [`BandId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandCategory {
    /// Raw optical band read straight from the product
    Spectral,
    /// Raw radar band read straight from the product
    Radar,
    /// Spectral or radar index computed from raw bands
    Index,
    /// DEM, SLOPE, HILLSHADE
    Dem,
    /// Cloud / shadow masks provided by the product
    Cloud,
}

impl BandCategory {
    /// Whether this category can ever be requested from a sensor type.
    ///
    /// Indices are accepted here for both sensors; the index registry
    /// narrows them down per index.
    pub fn allowed_for(&self, sensor: SensorType) -> bool {
        match self {
            BandCategory::Spectral | BandCategory::Cloud => sensor == SensorType::Optical,
            BandCategory::Radar => sensor == SensorType::Sar,
            BandCategory::Index | BandCategory::Dem => true,
        }
    }

    /// Whether bands of this category are read from the product itself.
    pub fn is_raw(&self) -> bool {
        matches!(self, BandCategory::Spectral | BandCategory::Radar)
    }
}

impl fmt::Display for BandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BandCategory::Spectral => "spectral",
            BandCategory::Radar => "radar",
            BandCategory::Index => "index",
            BandCategory::Dem => "dem",
            BandCategory::Cloud => "cloud",
        };
        write!(f, "{}", name)
    }
}

macro_rules! band_ids {
    ($($variant:ident => ($name:literal, $category:ident)),+ $(,)?) => {
        /// Canonical, sensor-agnostic band identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum BandId {
            $($variant),+
        }

        impl BandId {
            /// Every band of the vocabulary, in declaration order.
            pub const ALL: &'static [BandId] = &[$(BandId::$variant),+];

            /// Canonical upper-case name (`"RED"`, `"VV_DSPK"`, `"NDVI"`).
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(BandId::$variant => $name),+
                }
            }

            /// Static category of this band.
            pub fn category(&self) -> BandCategory {
                match self {
                    $(BandId::$variant => BandCategory::$category),+
                }
            }
        }
    };
}

band_ids! {
    // Optical
    CoastalAerosol => ("CA", Spectral),
    Blue => ("BLUE", Spectral),
    Green => ("GREEN", Spectral),
    Yellow => ("YELLOW", Spectral),
    Red => ("RED", Spectral),
    Vre1 => ("VRE_1", Spectral),
    Vre2 => ("VRE_2", Spectral),
    Vre3 => ("VRE_3", Spectral),
    Nir => ("NIR", Spectral),
    NarrowNir => ("NARROW_NIR", Spectral),
    WaterVapour => ("WV", Spectral),
    SwirCirrus => ("SWIR_CIRRUS", Spectral),
    Swir1 => ("SWIR_1", Spectral),
    Swir2 => ("SWIR_2", Spectral),
    Tir1 => ("TIR_1", Spectral),
    Tir2 => ("TIR_2", Spectral),
    Pan => ("PAN", Spectral),
    // Radar
    Vv => ("VV", Radar),
    VvDspk => ("VV_DSPK", Radar),
    Vh => ("VH", Radar),
    VhDspk => ("VH_DSPK", Radar),
    Hh => ("HH", Radar),
    HhDspk => ("HH_DSPK", Radar),
    Hv => ("HV", Radar),
    HvDspk => ("HV_DSPK", Radar),
    // Terrain
    Dem => ("DEM", Dem),
    Slope => ("SLOPE", Dem),
    Hillshade => ("HILLSHADE", Dem),
    // Clouds
    RawClouds => ("RAW_CLOUDS", Cloud),
    Clouds => ("CLOUDS", Cloud),
    Shadows => ("SHADOWS", Cloud),
    Cirrus => ("CIRRUS", Cloud),
    AllClouds => ("ALL_CLOUDS", Cloud),
    // Indices
    Ndvi => ("NDVI", Index),
    Ndwi => ("NDWI", Index),
    Mndwi => ("MNDWI", Index),
    Ndmi => ("NDMI", Index),
    Nbr => ("NBR", Index),
    Nbr2 => ("NBR2", Index),
    Ndsi => ("NDSI", Index),
    Savi => ("SAVI", Index),
    Evi => ("EVI", Index),
    Gndvi => ("GNDVI", Index),
    Ndre => ("NDRE", Index),
    Bai => ("BAI", Index),
    Rvi => ("RVI", Index),
}

impl BandId {
    /// Whether this band belongs to the DEM family.
    pub fn is_dem_family(&self) -> bool {
        self.category() == BandCategory::Dem
    }

    /// Parse a comma-separated band list (`"RED,NIR,NDVI"`).
    pub fn parse_list(s: &str) -> Result<Vec<BandId>, BandParseError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(BandId::from_str)
            .collect()
    }
}

impl fmt::Display for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BandId {
    type Err = BandParseError;

    /// Case-insensitive; `-` and ` ` are accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        BandId::ALL
            .iter()
            .find(|band| band.as_str() == normalized)
            .copied()
            .ok_or_else(|| BandParseError::UnknownBand(s.to_string()))
    }
}

impl Serialize for BandId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BandId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BandId::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BandParseError {
    #[error("Unknown band: {0}")]
    UnknownBand(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = BandId::ALL.iter().map(|b| b.as_str()).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn test_parse_band() {
        assert_eq!("red".parse::<BandId>().unwrap(), BandId::Red);
        assert_eq!("SWIR-1".parse::<BandId>().unwrap(), BandId::Swir1);
        assert_eq!("vv_dspk".parse::<BandId>().unwrap(), BandId::VvDspk);
        assert!("B04".parse::<BandId>().is_err());
    }

    #[test]
    fn test_parse_list() {
        let bands = BandId::parse_list("NDVI, red ,,DEM").unwrap();
        assert_eq!(bands, vec![BandId::Ndvi, BandId::Red, BandId::Dem]);
    }

    #[test]
    fn test_categories() {
        assert_eq!(BandId::Nir.category(), BandCategory::Spectral);
        assert_eq!(BandId::Hv.category(), BandCategory::Radar);
        assert_eq!(BandId::Hillshade.category(), BandCategory::Dem);
        assert_eq!(BandId::Cirrus.category(), BandCategory::Cloud);
        assert_eq!(BandId::Rvi.category(), BandCategory::Index);
    }

    #[test]
    fn test_category_sensor_compatibility() {
        assert!(BandCategory::Spectral.allowed_for(SensorType::Optical));
        assert!(!BandCategory::Spectral.allowed_for(SensorType::Sar));
        assert!(!BandCategory::Radar.allowed_for(SensorType::Optical));
        assert!(!BandCategory::Cloud.allowed_for(SensorType::Sar));
        assert!(BandCategory::Dem.allowed_for(SensorType::Sar));
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let json = serde_json::to_string(&BandId::Swir2).unwrap();
        assert_eq!(json, "\"SWIR_2\"");
        let back: BandId = serde_json::from_str("\"ndvi\"").unwrap();
        assert_eq!(back, BandId::Ndvi);
    }
}
