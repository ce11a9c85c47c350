//! EO product inspection library.
//!
//! Backs the `eo-inspect` binary: each command resolves or opens a
//! product and returns a serializable report.

pub mod commands;
pub mod config;
