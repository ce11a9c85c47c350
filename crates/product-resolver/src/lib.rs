//! Satellite product resolution library.
//!
//! Turns an arbitrary filesystem path (an extracted product folder, a zip
//! or tar archive, or a single file) into a [`Product`]: a
//! constellation-agnostic descriptor with a canonical band map.
//!
//! # Architecture
//!
//! ```text
//! path ──► open_source() ──► FileSource (directory | zip | tar)
//!                               │
//!                               ▼
//!          Resolver::resolve(strategy, candidates)
//!                               │   first matching rule of the
//!                               │   FormatRegistry wins
//!                               ▼
//!          ProductFactory::build(format) ──► FormatBehavior
//!                               │   name → datetime → id → instrument
//!                               │   → product type → pixel size
//!                               │   → band map → condensed name
//!                               ▼
//!                            Product
//! ```

pub mod descriptor;
pub mod factory;
pub mod formats;
pub mod metadata;
pub mod registry;
pub mod resolver;
pub mod source;

// Re-exports
pub use descriptor::{BandMap, Product, ProductDescriptor, RawBand, WavelengthRange};
pub use factory::{condensed_name, DescriptorOverrides, ExtractionContext, FormatBehavior, ProductFactory};
pub use metadata::{detect_source_kind, strip_archive_extension, SourceKind};
pub use formats::{LandsatBehavior, Sentinel1Behavior, Sentinel2Behavior};
pub use registry::{FormatId, FormatRegistry, FormatRule, FormatRuleBuilder, NamePatternSet};
pub use resolver::{Resolver, Strategy};
pub use source::{open_source, DirectorySource, FileSource, SearchDepth, TarSource, ZipSource};
