//! Domain detector configurations

mod afr;
mod boost;
mod coolant;
mod fuel_trim;
mod intake_air;
mod knock;

pub use afr::AfrProfile;
pub use boost::BoostProfile;
pub use coolant::CoolantProfile;
pub use fuel_trim::{FuelTrimProfile, TrimKind};
pub use intake_air::IntakeAirProfile;
pub use knock::KnockProfile;
