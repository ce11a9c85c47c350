//! Spectral and radar index registry.
//!
//! Every index declares the raw bands it needs, the sensor it applies to
//! and a pixel-wise formula. Formulas receive pixel values in input order;
//! NaN inputs give NaN outputs, as does a zero denominator.

use eo_common::{BandId, ProductError, ProductResult, SensorType};
use rayon::prelude::*;

/// Largest number of inputs any index takes.
const MAX_INPUTS: usize = 3;

/// Static description of one index.
pub struct IndexSpec {
    pub index: BandId,
    /// Required raw bands, in the order the formula expects them
    pub inputs: &'static [BandId],
    pub sensor: SensorType,
    formula: fn(&[f32]) -> f32,
}

impl std::fmt::Debug for IndexSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSpec")
            .field("index", &self.index)
            .field("inputs", &self.inputs)
            .field("sensor", &self.sensor)
            .finish()
    }
}

impl IndexSpec {
    /// Evaluate the formula on a single pixel.
    pub fn evaluate(&self, pixel: &[f32]) -> f32 {
        (self.formula)(pixel)
    }

    /// Evaluate the formula over whole bands given in input order.
    pub fn compute(&self, inputs: &[&[f32]]) -> ProductResult<Vec<f32>> {
        if inputs.len() != self.inputs.len() {
            return Err(ProductError::IndexNotComputable {
                index: self.index,
                missing: self.inputs[inputs.len().min(self.inputs.len())..].to_vec(),
            });
        }
        let len = inputs.first().map(|band| band.len()).unwrap_or(0);
        if let Some((position, _)) = inputs.iter().enumerate().find(|(_, band)| band.len() != len) {
            return Err(ProductError::GridMismatch {
                band: self.inputs[position],
                message: format!("input of {} is not collocated with {}", self.index, self.inputs[0]),
            });
        }

        let data = (0..len)
            .into_par_iter()
            .map(|i| {
                let mut pixel = [f32::NAN; MAX_INPUTS];
                for (slot, band) in pixel.iter_mut().zip(inputs) {
                    *slot = band[i];
                }
                self.evaluate(&pixel[..inputs.len()])
            })
            .collect();
        Ok(data)
    }
}

fn normalized_difference(a: f32, b: f32) -> f32 {
    let sum = a + b;
    if sum == 0.0 {
        return f32::NAN;
    }
    (a - b) / sum
}

fn ratio(numerator: f32, denominator: f32) -> f32 {
    if denominator == 0.0 {
        return f32::NAN;
    }
    numerator / denominator
}

use BandId::*;

static INDICES: &[IndexSpec] = &[
    IndexSpec {
        index: Ndvi,
        inputs: &[Nir, Red],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    IndexSpec {
        index: Ndwi,
        inputs: &[Green, Nir],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    IndexSpec {
        index: Mndwi,
        inputs: &[Green, Swir1],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    IndexSpec {
        index: Ndmi,
        inputs: &[Nir, Swir1],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    IndexSpec {
        index: Nbr,
        inputs: &[Nir, Swir2],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    IndexSpec {
        index: Nbr2,
        inputs: &[Swir1, Swir2],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    IndexSpec {
        index: Ndsi,
        inputs: &[Green, Swir1],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    // L = 0.5
    IndexSpec {
        index: Savi,
        inputs: &[Nir, Red],
        sensor: SensorType::Optical,
        formula: |p| ratio(1.5 * (p[0] - p[1]), p[0] + p[1] + 0.5),
    },
    IndexSpec {
        index: Evi,
        inputs: &[Nir, Red, Blue],
        sensor: SensorType::Optical,
        formula: |p| ratio(2.5 * (p[0] - p[1]), p[0] + 6.0 * p[1] - 7.5 * p[2] + 1.0),
    },
    IndexSpec {
        index: Gndvi,
        inputs: &[Nir, Green],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    IndexSpec {
        index: Ndre,
        inputs: &[Nir, Vre1],
        sensor: SensorType::Optical,
        formula: |p| normalized_difference(p[0], p[1]),
    },
    // Distance to the charcoal reference point (0.1, 0.06)
    IndexSpec {
        index: Bai,
        inputs: &[Red, Nir],
        sensor: SensorType::Optical,
        formula: |p| ratio(1.0, (0.1 - p[0]).powi(2) + (0.06 - p[1]).powi(2)),
    },
    // Dual-pol radar vegetation index, linear backscatter
    IndexSpec {
        index: Rvi,
        inputs: &[Vh, Vv],
        sensor: SensorType::Sar,
        formula: |p| ratio(4.0 * p[0], p[0] + p[1]),
    },
];

/// Look up an index by its band id.
pub fn lookup(index: BandId) -> Option<&'static IndexSpec> {
    INDICES.iter().find(|spec| spec.index == index)
}

/// Every registered index.
pub fn all() -> &'static [IndexSpec] {
    INDICES
}

#[cfg(test)]
mod tests {
    use super::*;
    use eo_common::BandCategory;

    #[test]
    fn test_every_index_band_is_registered() {
        for band in BandId::ALL.iter().filter(|b| b.category() == BandCategory::Index) {
            let spec = lookup(*band).unwrap_or_else(|| panic!("{} has no formula", band));
            assert!(!spec.inputs.is_empty());
            assert!(spec.inputs.len() <= MAX_INPUTS);
            assert!(spec.inputs.iter().all(|b| b.category().is_raw()));
        }
        assert_eq!(all().len(), 13);
    }

    #[test]
    fn test_ndvi() {
        let ndvi = lookup(BandId::Ndvi).unwrap();
        assert_eq!(ndvi.inputs, &[BandId::Nir, BandId::Red]);
        assert!((ndvi.evaluate(&[0.5, 0.1]) - 0.6667).abs() < 1e-4);
        assert!(ndvi.evaluate(&[0.0, 0.0]).is_nan());
        assert!(ndvi.evaluate(&[f32::NAN, 0.1]).is_nan());
    }

    #[test]
    fn test_savi_and_evi() {
        let savi = lookup(BandId::Savi).unwrap();
        assert!((savi.evaluate(&[0.5, 0.1]) - 0.54545).abs() < 1e-4);

        let evi = lookup(BandId::Evi).unwrap();
        // 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1)
        assert!((evi.evaluate(&[0.5, 0.1, 0.05]) - 0.57971).abs() < 1e-4);
    }

    #[test]
    fn test_rvi_is_radar() {
        let rvi = lookup(BandId::Rvi).unwrap();
        assert_eq!(rvi.sensor, SensorType::Sar);
        assert!((rvi.evaluate(&[0.02, 0.08]) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_compute_bands() {
        let ndwi = lookup(BandId::Ndwi).unwrap();
        let green = [0.3, 0.2, f32::NAN];
        let nir = [0.1, 0.2, 0.4];
        let out = ndwi.compute(&[&green[..], &nir[..]]).unwrap();
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
        assert!(out[2].is_nan());
    }

    #[test]
    fn test_compute_rejects_misaligned_inputs() {
        let ndvi = lookup(BandId::Ndvi).unwrap();
        let nir: &[f32] = &[0.1, 0.2];
        let red: &[f32] = &[0.1];
        let err = ndvi.compute(&[nir, red]).unwrap_err();
        assert_eq!(err.kind(), "GridMismatch");

        let err = ndvi.compute(&[nir]).unwrap_err();
        assert_eq!(err.kind(), "IndexNotComputable");
    }
}
