//! Test data generators for creating synthetic raster data.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at specified `(col, row)` positions,
/// `value` elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    value: f32,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![value; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Creates an inclined plane DEM: `z = base + dz_dx * x - dz_dy * y`, where
/// `x`/`y` are pixel-center distances in meters from the upper-left corner
/// (y grows southwards).
///
/// A plane has the same slope everywhere, which makes terrain derivatives
/// easy to check analytically.
pub fn create_plane_dem(
    width: usize,
    height: usize,
    pixel_size: f64,
    base: f64,
    dz_dx: f64,
    dz_dy: f64,
) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x = (col as f64 + 0.5) * pixel_size;
            let y = (row as f64 + 0.5) * pixel_size;
            data.push((base + dz_dx * x - dz_dy * y) as f32);
        }
    }
    data
}

/// Creates a smooth hill: elevation peaks at `peak` meters in the grid
/// center and falls off to 0 at the corners.
pub fn create_dem_grid(width: usize, height: usize, peak: f32) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let t = (dx * dx + dy * dy).sqrt() / max_dist;
            data.push(peak * (1.0 - t * t));
        }
    }
    data
}

/// Creates reflectance-like values in `[0, 1)` that vary smoothly across
/// the grid, offset by `seed` so different bands get different values.
pub fn create_reflectance_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    let offset = (seed % 97) as f32 / 97.0;
    for row in 0..height {
        for col in 0..width {
            let x = col as f32 / width.max(1) as f32;
            let y = row as f32 / height.max(1) as f32;
            data.push(((x * 0.5 + y * 0.3 + offset) % 1.0).abs());
        }
    }
    data
}
