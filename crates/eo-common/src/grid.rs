//! Grid model: shape + affine transform + CRS.
//!
//! Two arrays can be combined pixel-wise only when their [`GridSpec`]s are
//! equal; everything else goes through collocation first.

use crate::{BoundingBox, Crs};
use serde::{Deserialize, Serialize};

/// Relative tolerance used when comparing transform coefficients.
const TRANSFORM_EPSILON: f64 = 1e-9;

/// Affine transformation between pixel and world coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up rasters have zero rotations and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y (usually negative)
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform without rotation.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL ordering `[origin_x, pixel_width, row_rot, origin_y, col_rot, pixel_height]`.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL ordering.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// World coordinates of the center of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64 + 0.5;
        let row_f = row as f64 + 0.5;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Fractional pixel coordinates (col, row) of a world point, measured
    /// from the upper-left corner of the raster.
    ///
    /// Returns `None` for a degenerate (non-invertible) transform.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < f64::EPSILON {
            return None;
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (dx * self.pixel_height - dy * self.row_rotation) / det;
        let row = (dy * self.pixel_width - dx * self.col_rotation) / det;
        Some((col, row))
    }

    /// Coefficient-wise comparison with a tolerance relative to the pixel size.
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        let scale = self.pixel_width.abs().max(self.pixel_height.abs()).max(1.0);
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= TRANSFORM_EPSILON * scale.max(a.abs()))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

/// Full description of where a raster sits: shape, transform and CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
}

impl GridSpec {
    pub fn new(width: usize, height: usize, transform: GeoTransform, crs: Option<Crs>) -> Self {
        Self {
            width,
            height,
            transform,
            crs,
        }
    }

    /// Build a north-up grid covering `bounds` at a square `pixel_size`.
    ///
    /// The shape is rounded up so the grid always covers the bounds.
    pub fn from_bounds(bounds: &BoundingBox, pixel_size: f64, crs: Option<Crs>) -> Self {
        let width = (bounds.width() / pixel_size).ceil().max(1.0) as usize;
        let height = (bounds.height() / pixel_size).ceil().max(1.0) as usize;
        Self::new(
            width,
            height,
            GeoTransform::new(bounds.min_x, bounds.max_y, pixel_size, -pixel_size),
            crs,
        )
    }

    /// Build a north-up grid covering `bounds` with an explicit shape.
    pub fn from_bounds_and_shape(
        bounds: &BoundingBox,
        width: usize,
        height: usize,
        crs: Option<Crs>,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self::new(
            width,
            height,
            GeoTransform::new(
                bounds.min_x,
                bounds.max_y,
                bounds.width() / width as f64,
                -bounds.height() / height as f64,
            ),
            crs,
        )
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Shape as (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Absolute pixel size (x, y).
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.transform.pixel_width.abs(),
            self.transform.pixel_height.abs(),
        )
    }

    /// Extent covered by the grid (north-up grids only).
    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        let x0 = t.origin_x;
        let x1 = t.origin_x + self.width as f64 * t.pixel_width;
        let y0 = t.origin_y;
        let y1 = t.origin_y + self.height as f64 * t.pixel_height;
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Same shape, same transform (within tolerance) and same CRS.
    pub fn same_grid(&self, other: &GridSpec) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.crs == other.crs
            && self.transform.approx_eq(&other.transform)
    }

    /// The cells of this grid that overlap `window`, snapped outward to
    /// whole pixels. `None` when the window misses the grid.
    pub fn crop(&self, window: &BoundingBox) -> Option<GridSpec> {
        let overlap = self.bounds().intersection(window)?;
        let (px, py) = self.resolution();
        let bounds = self.bounds();

        let col0 = ((overlap.min_x - bounds.min_x) / px).floor().max(0.0) as usize;
        let col1 = ((overlap.max_x - bounds.min_x) / px).ceil().min(self.width as f64) as usize;
        let row0 = ((bounds.max_y - overlap.max_y) / py).floor().max(0.0) as usize;
        let row1 = ((bounds.max_y - overlap.min_y) / py).ceil().min(self.height as f64) as usize;
        if col1 <= col0 || row1 <= row0 {
            return None;
        }

        let transform = GeoTransform::new(
            bounds.min_x + col0 as f64 * px,
            bounds.max_y - row0 as f64 * py,
            px,
            -py,
        );
        Some(Self::new(col1 - col0, row1 - row0, transform, self.crs))
    }

    /// Same extent resampled to a new square pixel size.
    pub fn with_pixel_size(&self, pixel_size: f64) -> Self {
        Self::from_bounds(&self.bounds(), pixel_size, self.crs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm_grid(pixel: f64) -> GridSpec {
        GridSpec::from_bounds(
            &BoundingBox::new(600000.0, 5090220.0, 600600.0, 5090820.0),
            pixel,
            Some(Crs::from_epsg(32631)),
        )
    }

    #[test]
    fn test_from_bounds() {
        let grid = utm_grid(10.0);
        assert_eq!(grid.width, 60);
        assert_eq!(grid.height, 60);
        assert_eq!(grid.resolution(), (10.0, 10.0));
        assert_eq!(grid.bounds(), BoundingBox::new(600000.0, 5090220.0, 600600.0, 5090820.0));
    }

    #[test]
    fn test_pixel_roundtrip() {
        let grid = utm_grid(20.0);
        let (x, y) = grid.transform.pixel_center(3, 7);
        let (col, row) = grid.transform.world_to_pixel(x, y).unwrap();
        assert!((col - 3.5).abs() < 1e-9);
        assert!((row - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_same_grid() {
        let a = utm_grid(10.0);
        let b = utm_grid(10.0);
        let c = utm_grid(20.0);
        assert!(a.same_grid(&b));
        assert!(!a.same_grid(&c));

        let mut other_crs = a;
        other_crs.crs = Some(Crs::from_epsg(32632));
        assert!(!a.same_grid(&other_crs));
    }

    #[test]
    fn test_with_pixel_size_keeps_extent() {
        let grid = utm_grid(10.0).with_pixel_size(60.0);
        assert_eq!(grid.width, 10);
        assert_eq!(grid.bounds().min_x, 600000.0);
    }

    #[test]
    fn test_gdal_roundtrip() {
        let t = GeoTransform::from_gdal([1.0, 2.0, 0.0, 4.0, 0.0, -2.0]);
        assert_eq!(t.to_gdal(), [1.0, 2.0, 0.0, 4.0, 0.0, -2.0]);
    }

    #[test]
    fn test_crop_snaps_to_pixels() {
        let grid = utm_grid(10.0);
        let cropped = grid
            .crop(&BoundingBox::new(600015.0, 5090500.0, 600100.0, 5090900.0))
            .unwrap();
        assert_eq!((cropped.width, cropped.height), (9, 32));
        assert_eq!(cropped.bounds(), BoundingBox::new(600010.0, 5090500.0, 600100.0, 5090820.0));
        assert_eq!(cropped.crs, grid.crs);

        assert!(grid.crop(&BoundingBox::new(0.0, 0.0, 10.0, 10.0)).is_none());
        assert!(grid.crop(&grid.bounds()).unwrap().same_grid(&grid));
    }
}
