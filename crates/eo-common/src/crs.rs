//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A CRS identified by its EPSG code.
///
/// Products arrive in many projections (mostly UTM zones), so the code is
/// kept open rather than restricted to a fixed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    /// WGS84 geographic.
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = CrsParseError;

    /// Accepts `"EPSG:32631"`, `"epsg:32631"`, `"CRS:84"` and bare `"32631"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(Crs::WGS84);
        }

        let code = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        code.parse::<u32>()
            .map(Crs::from_epsg)
            .map_err(|_| CrsParseError::UnsupportedCrs(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!("epsg:32631".parse::<Crs>().unwrap(), Crs::from_epsg(32631));
        assert_eq!("CRS:84".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!("32740".parse::<Crs>().unwrap(), Crs::from_epsg(32740));
        assert!("EPSG:abc".parse::<Crs>().is_err());
    }
}
