//! Event detection
//!
//! One generic pipeline ([`engine`]) configured per monitored quantity by a
//! [`DetectionProfile`]. Each profile turns rows into classified samples; the
//! engine merges them into events, drops short transients and coalesces the
//! rest into event groups.
//!
//! Detection never fails: a missing column yields an empty
//! [`DetectionResult`] with `error` set.

pub mod engine;
mod profile;
pub mod profiles;
mod types;

pub use engine::{detect, event_duration, EventDetector};
pub use profile::DetectionProfile;
pub use profiles::{
    AfrProfile, BoostProfile, CoolantProfile, FuelTrimProfile, IntakeAirProfile, KnockProfile,
    TrimKind,
};
pub use types::{
    Classification, DetectionResult, Domain, Event, EventGroup, Reading, Sample, Severity,
    Statistics, Thresholds, Timing,
};
