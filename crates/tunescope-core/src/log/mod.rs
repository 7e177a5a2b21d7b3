//! Log rows and channel binding
//!
//! The ingestion pipeline hands over a column list plus a stream of records;
//! this module binds columns to [`Channel`]s once and produces the typed,
//! time-ordered [`LogDataset`] every analysis reads.

mod channel;
mod dataset;
pub mod resolver;

pub use channel::{Channel, LogRow};
pub use dataset::{
    estimate_sampling_interval, IngestOptions, LogDataset, RawLog, DEFAULT_SAMPLING_INTERVAL,
    MIN_SAMPLING_INTERVAL, TIME_CANDIDATES,
};
pub use resolver::{resolve_column, ColumnMatch, ColumnResolver, MatchStage};
