//! Point sampling kernels.
//!
//! Coordinates are fractional pixel indices: `(0.0, 0.0)` is the center of
//! the top-left pixel. Points more than half a pixel outside the grid give
//! NaN; points within that margin are clamped onto the edge pixels.

use crate::types::ResamplingMethod;

/// Whether (x, y) falls on the grid's footprint.
fn in_footprint(width: usize, height: usize, x: f64, y: f64) -> bool {
    width > 0
        && height > 0
        && x >= -0.5
        && y >= -0.5
        && x <= width as f64 - 0.5
        && y <= height as f64 - 0.5
}

/// Sample `data` at (x, y) with `method`.
pub fn sample(method: ResamplingMethod, data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    match method {
        ResamplingMethod::Nearest => nearest_interpolate(data, width, height, x, y),
        ResamplingMethod::Bilinear => bilinear_interpolate(data, width, height, x, y),
        ResamplingMethod::Cubic => cubic_interpolate(data, width, height, x, y),
    }
}

/// Nearest neighbor interpolation.
pub fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !in_footprint(width, height, x, y) {
        return f32::NAN;
    }

    let col = (x.round().max(0.0) as usize).min(width - 1);
    let row = (y.round().max(0.0) as usize).min(height - 1);
    data[row * width + col]
}

/// Bilinear interpolation between the four surrounding pixel centers.
///
/// Any NaN corner gives NaN.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !in_footprint(width, height, x, y) {
        return f32::NAN;
    }

    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Bicubic (Catmull-Rom) interpolation over the 4x4 neighborhood.
///
/// Falls back to bilinear when the neighborhood holds a NaN.
pub fn cubic_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    if !in_footprint(width, height, x, y) {
        return f32::NAN;
    }

    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    let xi = x.floor() as i64;
    let yi = y.floor() as i64;
    let xf = (x - xi as f64) as f32;
    let yf = (y - yi as f64) as f32;

    let mut rows = [0.0f32; 4];
    for (j, row_value) in rows.iter_mut().enumerate() {
        let py = (yi + j as i64 - 1).clamp(0, height as i64 - 1) as usize;
        let mut values = [0.0f32; 4];
        for (i, value) in values.iter_mut().enumerate() {
            let px = (xi + i as i64 - 1).clamp(0, width as i64 - 1) as usize;
            *value = data[py * width + px];
            if value.is_nan() {
                return bilinear_interpolate(data, width, height, x, y);
            }
        }
        *row_value = cubic_1d(values, xf);
    }

    cubic_1d(rows, yf)
}

/// 1D Catmull-Rom spline through `p[1]` (t = 0) and `p[2]` (t = 1).
fn cubic_1d(p: [f32; 4], t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p[0] + 1.5 * p[1] - 1.5 * p[2] + 0.5 * p[3];
    let b = p[0] - 2.5 * p[1] + 2.0 * p[2] - 0.5 * p[3];
    let c = -0.5 * p[0] + 0.5 * p[2];
    let d = p[1];

    a * t3 + b * t2 + c * t + d
}
