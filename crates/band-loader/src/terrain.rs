//! Terrain derivatives of a warped DEM.
//!
//! Both SLOPE and HILLSHADE use Horn's 3x3 gradient. Border pixels and
//! pixels with a NaN neighbour are NaN.

use rayon::prelude::*;

use crate::config::HillshadeParams;
use crate::types::{RasterArray, SlopeUnits};

/// Horn gradient (dz/dx, dz/dy) at an interior pixel, with y pointing
/// down the rows. `None` when any neighbour is NaN.
fn horn_gradient(dem: &[f32], width: usize, col: usize, row: usize, dx: f64, dy: f64) -> Option<(f64, f64)> {
    let at = |c: usize, r: usize| dem[r * width + c] as f64;

    let a = at(col - 1, row - 1);
    let b = at(col, row - 1);
    let c = at(col + 1, row - 1);
    let d = at(col - 1, row);
    let f = at(col + 1, row);
    let g = at(col - 1, row + 1);
    let h = at(col, row + 1);
    let i = at(col + 1, row + 1);

    if [a, b, c, d, at(col, row), f, g, h, i].iter().any(|v| v.is_nan()) {
        return None;
    }

    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);
    Some((dz_dx, dz_dy))
}

/// Apply `kernel` to the gradient of every interior pixel.
fn map_gradient<F>(dem: &RasterArray, z_factor: f64, kernel: F) -> RasterArray
where
    F: Fn(f64, f64) -> f32 + Sync,
{
    let (width, height) = (dem.grid.width, dem.grid.height);
    let (dx, dy) = dem.grid.resolution();
    let source = &dem.data;

    let mut data = vec![f32::NAN; width * height];
    if width >= 3 && height >= 3 {
        data.par_chunks_mut(width)
            .enumerate()
            .filter(|(row, _)| *row > 0 && *row < height - 1)
            .for_each(|(row, out_row)| {
                for col in 1..width - 1 {
                    if let Some((gx, gy)) = horn_gradient(source, width, col, row, dx, dy) {
                        out_row[col] = kernel(gx * z_factor, gy * z_factor);
                    }
                }
            });
    }

    let mut out = dem.with_data(data);
    out.nodata = None;
    out
}

/// Slope of the terrain in `units`.
pub fn slope(dem: &RasterArray, units: SlopeUnits) -> RasterArray {
    map_gradient(dem, 1.0, |gx, gy| {
        let rise = (gx * gx + gy * gy).sqrt();
        match units {
            SlopeUnits::Degrees => rise.atan().to_degrees() as f32,
            SlopeUnits::Percent => (rise * 100.0) as f32,
        }
    })
}

/// Hillshade in `[0, 255]`.
pub fn hillshade(dem: &RasterArray, params: &HillshadeParams) -> RasterArray {
    let zenith = (90.0 - params.altitude).to_radians();
    // Compass azimuth to math angle (counter-clockwise from east)
    let azimuth = (360.0 - params.azimuth + 90.0).rem_euclid(360.0).to_radians();
    let (cos_zenith, sin_zenith) = (zenith.cos(), zenith.sin());

    map_gradient(dem, params.z_factor, move |gx, gy| {
        let slope = (gx * gx + gy * gy).sqrt().atan();
        let aspect = if gx == 0.0 && gy == 0.0 {
            0.0
        } else {
            let a = gy.atan2(-gx);
            if a < 0.0 {
                a + std::f64::consts::TAU
            } else {
                a
            }
        };
        let shade = cos_zenith * slope.cos() + sin_zenith * slope.sin() * (azimuth - aspect).cos();
        (255.0 * shade.clamp(0.0, 1.0)) as f32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eo_common::{BoundingBox, GridSpec};
    use test_utils::{create_constant_grid, create_plane_dem};

    fn dem(data: Vec<f32>, size: usize, pixel: f64) -> RasterArray {
        let extent = size as f64 * pixel;
        let grid = GridSpec::from_bounds(&BoundingBox::new(0.0, 0.0, extent, extent), pixel, None);
        RasterArray::new(data, grid)
    }

    #[test]
    fn test_flat_slope_is_zero() {
        let out = slope(&dem(create_constant_grid(5, 5, 100.0), 5, 10.0), SlopeUnits::Degrees);
        assert_eq!(out.get(2, 2), Some(0.0));
        // Borders have no full neighbourhood
        assert!(out.get(0, 2).unwrap().is_nan());
    }

    #[test]
    fn test_plane_slope() {
        // 1 m rise per meter eastwards: 45 degrees, 100 percent
        let surface = dem(create_plane_dem(5, 5, 10.0, 100.0, 1.0, 0.0), 5, 10.0);
        let degrees = slope(&surface, SlopeUnits::Degrees);
        let percent = slope(&surface, SlopeUnits::Percent);
        assert!((degrees.get(2, 2).unwrap() - 45.0).abs() < 1e-3);
        assert!((percent.get(1, 3).unwrap() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_slope_nan_neighbour() {
        let mut data = create_constant_grid(5, 5, 100.0);
        data[6] = f32::NAN; // (1, 1)
        let out = slope(&dem(data, 5, 10.0), SlopeUnits::Degrees);
        assert!(out.get(2, 2).unwrap().is_nan());
        assert_eq!(out.get(3, 3), Some(0.0));
    }

    #[test]
    fn test_flat_hillshade() {
        let out = hillshade(&dem(create_constant_grid(4, 4, 50.0), 4, 30.0), &HillshadeParams::default());
        // cos(45 degrees) * 255
        assert!((out.get(1, 1).unwrap() - 180.31).abs() < 0.01);
    }

    #[test]
    fn test_hillshade_faces_the_sun() {
        // Default sun in the north-west
        let params = HillshadeParams::default();
        let rising_east = dem(create_plane_dem(5, 5, 10.0, 0.0, 0.5, 0.0), 5, 10.0);
        let rising_west = dem(create_plane_dem(5, 5, 10.0, 100.0, -0.5, 0.0), 5, 10.0);

        let east_facing = hillshade(&rising_west, &params).get(2, 2).unwrap();
        let west_facing = hillshade(&rising_east, &params).get(2, 2).unwrap();
        assert!(west_facing > east_facing);
        assert!((0.0..=255.0).contains(&west_facing));
    }
}
