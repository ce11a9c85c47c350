//! Collocation: resampling arrays onto a common reference grid.
//!
//! Destination pixel centers are mapped to world coordinates through the
//! reference transform, then back into the source array's pixel space
//! and sampled there. Grids must share a CRS; reprojection is the raster
//! service's job.

pub mod interpolation;

pub use interpolation::{bilinear_interpolate, cubic_interpolate, nearest_interpolate, sample};

use eo_common::{BandId, GridSpec, ProductError, ProductResult};
use rayon::prelude::*;
use tracing::debug;

use crate::types::{RasterArray, ResamplingMethod};

/// Resample `array` onto `reference`.
///
/// Arrays already on the reference grid are returned untouched. Pixels
/// outside the source footprint become NaN.
pub fn collocate(
    band: BandId,
    array: RasterArray,
    reference: &GridSpec,
    method: ResamplingMethod,
) -> ProductResult<RasterArray> {
    array.check_shape(band)?;
    if array.grid.same_grid(reference) {
        return Ok(array);
    }

    if let (Some(src), Some(dst)) = (array.grid.crs, reference.crs) {
        if src != dst {
            return Err(ProductError::GridMismatch {
                band,
                message: format!("{} cannot be resampled onto {} without reprojection", src, dst),
            });
        }
    }

    debug!(
        band = %band,
        from = %format!("{}x{}", array.grid.width, array.grid.height),
        to = %format!("{}x{}", reference.width, reference.height),
        method = %method,
        "Collocating band"
    );

    let src = &array.grid;
    let src_transform = src.transform;
    let dst_transform = reference.transform;
    let nodata = array.nodata;

    // Nodata must not bleed into interpolated neighbours
    let source: Vec<f32> = match nodata {
        Some(nd) if !nd.is_nan() => array
            .data
            .iter()
            .map(|v| if *v == nd { f32::NAN } else { *v })
            .collect(),
        _ => array.data.clone(),
    };

    let mut data = vec![f32::NAN; reference.len()];
    data.par_chunks_mut(reference.width.max(1))
        .enumerate()
        .for_each(|(row, out_row)| {
            for (col, out) in out_row.iter_mut().enumerate() {
                let (x, y) = dst_transform.pixel_center(col, row);
                if let Some((sc, sr)) = src_transform.world_to_pixel(x, y) {
                    *out = sample(method, &source, src.width, src.height, sc - 0.5, sr - 0.5);
                }
            }
        });

    Ok(RasterArray {
        data,
        grid: *reference,
        nodata: None,
        attributes: array.attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eo_common::{BoundingBox, Crs};

    fn grid(pixel: f64) -> GridSpec {
        GridSpec::from_bounds(
            &BoundingBox::new(0.0, 0.0, 40.0, 40.0),
            pixel,
            Some(Crs::from_epsg(32631)),
        )
    }

    #[test]
    fn test_same_grid_is_untouched() {
        let array = RasterArray::new(vec![1.0; 16], grid(10.0));
        let out = collocate(BandId::Red, array.clone(), &grid(10.0), ResamplingMethod::Bilinear).unwrap();
        assert_eq!(out, array);
    }

    #[test]
    fn test_downsample_nearest() {
        // 20 m pixels onto a 10 m grid: each source pixel covers 2x2 targets
        #[rustfmt::skip]
        let array = RasterArray::new(vec![
            1.0, 2.0,
            3.0, 4.0,
        ], grid(20.0));
        let out = collocate(BandId::Swir1, array, &grid(10.0), ResamplingMethod::Nearest).unwrap();

        assert!(out.grid.same_grid(&grid(10.0)));
        assert_eq!(out.get(0, 0), Some(1.0));
        assert_eq!(out.get(1, 1), Some(1.0));
        assert_eq!(out.get(2, 0), Some(2.0));
        assert_eq!(out.get(3, 3), Some(4.0));
    }

    #[test]
    fn test_upsample_bilinear_constant() {
        let array = RasterArray::new(vec![7.0; 16], grid(10.0));
        let out = collocate(BandId::Nir, array, &grid(20.0), ResamplingMethod::Bilinear).unwrap();
        assert_eq!(out.data, vec![7.0; 4]);
    }

    #[test]
    fn test_outside_footprint_is_nan() {
        let array = RasterArray::new(vec![1.0; 4], grid(20.0));
        let wider = GridSpec::from_bounds(
            &BoundingBox::new(0.0, 0.0, 80.0, 40.0),
            20.0,
            Some(Crs::from_epsg(32631)),
        );
        let out = collocate(BandId::Red, array, &wider, ResamplingMethod::Nearest).unwrap();
        assert_eq!(out.get(0, 0), Some(1.0));
        assert!(out.get(3, 0).unwrap().is_nan());
    }

    #[test]
    fn test_nodata_becomes_nan() {
        let array = RasterArray::new(vec![0.0, 5.0, 5.0, 5.0], grid(20.0)).with_nodata(0.0);
        let out = collocate(BandId::Red, array, &grid(10.0), ResamplingMethod::Bilinear).unwrap();
        assert!(out.get(0, 0).unwrap().is_nan());
        assert_eq!(out.get(3, 3), Some(5.0));
        assert_eq!(out.nodata, None);
    }

    #[test]
    fn test_crs_mismatch() {
        let array = RasterArray::new(vec![1.0; 16], grid(10.0));
        let mut other = grid(20.0);
        other.crs = Some(Crs::from_epsg(32632));
        let err = collocate(BandId::Red, array, &other, ResamplingMethod::Nearest).unwrap_err();
        assert_eq!(err.kind(), "GridMismatch");
    }
}
