//! Common types and utilities shared across the EO product crates.
//!
//! Everything here is constellation-agnostic: the canonical band
//! vocabulary callers request bands with, the grid/CRS model every
//! materialized array is placed on, and the error taxonomy surfaced by
//! product resolution and band loading.

pub mod band;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;

pub use band::{BandCategory, BandId, OrbitDirection, SensorType};
pub use bbox::BoundingBox;
pub use crs::Crs;
pub use error::{ProductError, ProductResult};
pub use grid::{GeoTransform, GridSpec};
