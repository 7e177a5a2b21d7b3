//! Calibration ("tune") documents
//!
//! Loads a calibration document into named scalar, array and table maps and
//! provides clamped 1D and bilinear lookups over them.

mod accessors;
pub mod defaults;
mod error;
pub mod interpolate;
mod store;
pub mod values;

pub use accessors::{FanThresholds, IatThresholds, KnockParameters, PeEnable};
pub use defaults::MapIds;
pub use error::CalibrationError;
pub use interpolate::{bin_index, interpolate_1d, interpolate_2d};
pub use store::{CalibrationMetadata, CalibrationStore, MapEntry, MapKind, ValueField};
