//! Built-in format behaviors.

pub mod landsat;
pub mod sentinel1;
pub mod sentinel2;

use std::sync::Arc;

use crate::descriptor::RawBand;
use crate::factory::ProductFactory;
use crate::registry::FormatId;

pub use landsat::LandsatBehavior;
pub use sentinel1::Sentinel1Behavior;
pub use sentinel2::Sentinel2Behavior;

/// Register every built-in behavior on `factory`.
pub fn register_builtin(factory: &mut ProductFactory) {
    let landsat: Arc<LandsatBehavior> = Arc::new(LandsatBehavior);
    for format in [
        FormatId::L1,
        FormatId::L2,
        FormatId::L3,
        FormatId::L4,
        FormatId::L5,
        FormatId::L7,
        FormatId::L8,
        FormatId::L9,
    ] {
        factory.register(format, landsat.clone());
    }
    factory.register(FormatId::S2, Arc::new(Sentinel2Behavior));
    factory.register(FormatId::S1, Arc::new(Sentinel1Behavior));
}

/// Raw band with a wavelength range in nanometers.
pub(crate) fn optical_band(raw_id: impl Into<String>, gsd: f64, min_nm: f64, max_nm: f64) -> RawBand {
    RawBand::new(raw_id, gsd).with_wavelength(min_nm, max_nm)
}
