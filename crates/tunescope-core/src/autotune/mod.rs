//! Autotune
//!
//! Bins log rows by fuel table cell and turns the observed fueling error
//! into bounded corrections:
//!
//! - open loop (PE active, target λ < 1): `current * mean(measured / target)`
//! - closed loop: `current * (1 + mean(STFT + LTFT) / 100)`
//!
//! Where both modes produce a correction for the same cell the open-loop one
//! wins. Every applied change is clamped to `change_limit_percent` of the value
//! in the loaded calibration, so repeating analyze/apply cycles can never move
//! a cell by more than the limit per cycle.

mod bins;
mod engine;
mod error;
mod export;
mod filter;

pub use bins::{Bin, BinGrid, FuelMode};
pub use engine::{
    apply_change_limit, percent_change, AutotuneEngine, AutotuneOptions, AutotuneReport,
    CorrectionCell, RowAccounting, REQUIRED_CHANNELS,
};
pub use error::AutotuneError;
pub use export::export_corrected;
pub use filter::{AutotuneFilters, RowFilter};
