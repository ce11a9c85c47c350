//! Grid and bounding box behaviour relied on by collocation.

use eo_common::{BoundingBox, Crs, GeoTransform, GridSpec};

// ============================================================================
// GridSpec construction
// ============================================================================

#[test]
fn test_grid_covers_partial_pixels() {
    let bounds = BoundingBox::new(0.0, 0.0, 105.0, 95.0);
    let grid = GridSpec::from_bounds(&bounds, 10.0, None);
    assert_eq!(grid.width, 11);
    assert_eq!(grid.height, 10);
    assert_eq!(grid.len(), 110);
    assert!(!grid.is_empty());
}

#[test]
fn test_grid_from_shape() {
    let bounds = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
    let grid = GridSpec::from_bounds_and_shape(&bounds, 20, 10, Some(Crs::WGS84));
    assert_eq!(grid.resolution(), (5.0, 5.0));
    assert_eq!(grid.shape(), (10, 20));
    assert_eq!(grid.bounds(), bounds);
}

// ============================================================================
// Grid comparison
// ============================================================================

#[test]
fn test_same_grid_tolerates_float_noise() {
    let a = GridSpec::new(10, 10, GeoTransform::new(600000.0, 5000000.0, 10.0, -10.0), None);
    let b = GridSpec::new(
        10,
        10,
        GeoTransform::new(600000.0 + 1e-7, 5000000.0, 10.0, -10.0),
        None,
    );
    assert!(a.same_grid(&b));
}

#[test]
fn test_different_shape_is_different_grid() {
    let t = GeoTransform::new(0.0, 0.0, 1.0, -1.0);
    let a = GridSpec::new(10, 10, t, None);
    let b = GridSpec::new(10, 11, t, None);
    assert!(!a.same_grid(&b));
}

#[test]
fn test_world_to_pixel_corner() {
    let t = GeoTransform::new(100.0, 200.0, 2.0, -2.0);
    let (col, row) = t.world_to_pixel(100.0, 200.0).unwrap();
    assert_eq!((col, row), (0.0, 0.0));

    let (col, row) = t.world_to_pixel(110.0, 190.0).unwrap();
    assert_eq!((col, row), (5.0, 5.0));
}

#[test]
fn test_degenerate_transform() {
    let t = GeoTransform::new(0.0, 0.0, 0.0, 0.0);
    assert!(t.world_to_pixel(1.0, 1.0).is_none());
}
