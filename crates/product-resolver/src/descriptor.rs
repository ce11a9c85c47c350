//! Product descriptor and the owning product handle.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use eo_common::{BandId, OrbitDirection, ProductError, ProductResult, SensorType};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::registry::FormatId;

/// Spectral range of a band in nanometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthRange {
    pub min_nm: f64,
    pub max_nm: f64,
}

impl WavelengthRange {
    pub fn new(min_nm: f64, max_nm: f64) -> Self {
        Self { min_nm, max_nm }
    }

    pub fn center_nm(&self) -> f64 {
        (self.min_nm + self.max_nm) / 2.0
    }
}

/// Product-specific handle of a canonical band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBand {
    /// Identifier inside the product (`"B04"`, `"SR_B4"`, `"vv"`...)
    pub raw_id: String,
    /// Ground sampling distance in meters
    pub gsd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wavelength: Option<WavelengthRange>,
}

impl RawBand {
    pub fn new(raw_id: impl Into<String>, gsd: f64) -> Self {
        Self {
            raw_id: raw_id.into(),
            gsd,
            wavelength: None,
        }
    }

    pub fn with_wavelength(mut self, min_nm: f64, max_nm: f64) -> Self {
        self.wavelength = Some(WavelengthRange::new(min_nm, max_nm));
        self
    }
}

/// Canonical band → raw band handle, at most one handle per band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandMap {
    bands: BTreeMap<BandId, RawBand>,
}

impl BandMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a band.
    ///
    /// # Errors
    ///
    /// [`ProductError::Registry`] if the band already has a handle.
    pub fn insert(&mut self, band: BandId, raw: RawBand) -> ProductResult<()> {
        match self.bands.entry(band) {
            btree_map::Entry::Occupied(existing) => Err(ProductError::Registry(format!(
                "band {} mapped twice ({} and {})",
                band,
                existing.get().raw_id,
                raw.raw_id
            ))),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(raw);
                Ok(())
            }
        }
    }

    pub fn get(&self, band: BandId) -> Option<&RawBand> {
        self.bands.get(&band)
    }

    pub fn contains(&self, band: BandId) -> bool {
        self.bands.contains_key(&band)
    }

    pub fn bands(&self) -> impl Iterator<Item = BandId> + '_ {
        self.bands.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BandId, &RawBand)> {
        self.bands.iter().map(|(b, r)| (*b, r))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

impl FromIterator<(BandId, RawBand)> for BandMap {
    /// Later duplicates are ignored.
    fn from_iter<I: IntoIterator<Item = (BandId, RawBand)>>(iter: I) -> Self {
        let mut bands = BTreeMap::new();
        for (band, raw) in iter {
            bands.entry(band).or_insert(raw);
        }
        Self { bands }
    }
}

/// Normalized, constellation-agnostic description of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub path: PathBuf,
    pub is_archive: bool,
    pub format: FormatId,
    pub sensor_type: SensorType,
    pub name: String,
    pub product_type: String,
    pub instrument: String,
    /// Platform within the constellation (`"S2B"`, `"L8"`...)
    pub constellation_id: String,
    pub acquisition_datetime: NaiveDateTime,
    /// Native pixel size in meters
    pub default_pixel_size: f64,
    pub band_map: BandMap,
    pub cloud_bands: BTreeSet<BandId>,
    pub orbit_direction: Option<OrbitDirection>,
    /// `{YYYYMMDDTHHMMSS}_{FORMAT}_{PRODUCT_TYPE}[_{DISAMBIGUATOR}]`
    pub condensed_name: String,
    pub output_directory: PathBuf,
}

impl ProductDescriptor {
    /// Canonical bands the product can deliver directly from its files.
    pub fn has_band(&self, band: BandId) -> bool {
        self.band_map.contains(band)
    }

    pub fn has_cloud_band(&self, band: BandId) -> bool {
        self.cloud_bands.contains(&band)
    }

    /// Human-readable constellation name.
    pub fn constellation(&self) -> &'static str {
        self.format.name()
    }
}

/// A resolved product: its descriptor plus the scratch directory that holds
/// intermediate artifacts.
///
/// Dropping the handle removes the scratch directory.
#[derive(Debug)]
pub struct Product {
    descriptor: ProductDescriptor,
    scratch: TempDir,
}

impl Product {
    pub(crate) fn new(mut descriptor: ProductDescriptor, scratch: TempDir, output: Option<PathBuf>) -> ProductResult<Self> {
        descriptor.output_directory = match output {
            Some(dir) => {
                fs::create_dir_all(&dir)?;
                dir
            }
            None => scratch.path().to_path_buf(),
        };
        debug!(
            condensed_name = %descriptor.condensed_name,
            scratch = %scratch.path().display(),
            "Created product scratch directory"
        );
        Ok(Self {
            descriptor,
            scratch,
        })
    }

    pub fn descriptor(&self) -> &ProductDescriptor {
        &self.descriptor
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn output_directory(&self) -> &Path {
        &self.descriptor.output_directory
    }

    /// Redirect generated artifacts to `dir`, creating it if needed.
    pub fn set_output_directory(&mut self, dir: impl Into<PathBuf>) -> ProductResult<()> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(
            condensed_name = %self.descriptor.condensed_name,
            output = %dir.display(),
            "Changed output directory"
        );
        self.descriptor.output_directory = dir;
        Ok(())
    }

    /// Release the product and delete its scratch directory now, reporting
    /// any failure instead of ignoring it on drop.
    pub fn clear(self) -> ProductResult<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch.close()?;
        debug!(scratch = %path.display(), "Removed product scratch directory");
        Ok(())
    }
}
