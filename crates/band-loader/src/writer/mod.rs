//! Persisted artifact formats.

pub mod zarr_artifact;

pub use zarr_artifact::{read_artifact, write_artifact};
