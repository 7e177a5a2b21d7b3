//! Normalized log dataset
//!
//! Adapter between the ingestion pipeline's row stream and the typed
//! [`LogRow`]s the analyses consume. Columns are bound to channels once per
//! file; rows with an unreadable time are dropped, unreadable channel values
//! become `0.0`.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::channel::{Channel, LogRow};
use super::resolver::{ColumnResolver, MatchStage};
use crate::calibration::values::coerce_f64;
use crate::units::{afr_to_lambda, fahrenheit_to_celsius, looks_like_afr};

/// Column names tried for the time axis
pub const TIME_CANDIDATES: &[&str] = &["Time (s)", "Time", "Timestamp", "Seconds"];

/// Sampling interval assumed when a log has no usable gaps (seconds)
pub const DEFAULT_SAMPLING_INTERVAL: f64 = 0.05;
/// Smallest sampling interval the estimate may return (seconds)
pub const MIN_SAMPLING_INTERVAL: f64 = 0.01;
/// Gaps at or above this are treated as pauses, not sampling (seconds)
const MAX_SAMPLING_GAP: f64 = 1.0;
/// Number of gaps averaged for the estimate
const SAMPLING_GAP_WINDOW: usize = 1000;

/// Ingestion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Stoichiometric AFR used to convert AFR-valued lambda channels
    pub stoich_afr: f64,
    /// Extra column names per channel, tried before the built-in names
    pub columns: BTreeMap<Channel, Vec<String>>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            stoich_afr: 14.7,
            columns: BTreeMap::new(),
        }
    }
}

impl IngestOptions {
    /// Candidate names for a channel, configured names first
    pub fn candidates_for(&self, channel: Channel) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .columns
            .get(&channel)
            .map(|extra| extra.iter().map(String::as_str).collect())
            .unwrap_or_default();
        names.extend_from_slice(channel.default_candidates());
        names
    }
}

/// Serialized form of a normalized log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLog {
    /// Column headers
    pub columns: Vec<String>,
    /// One JSON value (number or string) per column
    pub rows: Vec<Vec<Value>>,
}

/// A fully loaded, time-ordered log
#[derive(Debug, Clone, Default)]
pub struct LogDataset {
    rows: Vec<LogRow>,
    columns: Vec<String>,
    bindings: BTreeMap<Channel, String>,
    sampling_interval: f64,
    dropped_rows: usize,
}

impl LogDataset {
    /// Build a dataset from already-typed rows
    ///
    /// `bindings` records which column each populated channel came from.
    pub fn new(mut rows: Vec<LogRow>, bindings: BTreeMap<Channel, String>) -> Self {
        rows.retain(|r| r.time.is_finite());
        rows.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut columns = vec![TIME_CANDIDATES[0].to_string()];
        columns.extend(bindings.values().cloned());

        let sampling_interval = estimate_sampling_interval(&rows);
        Self {
            rows,
            columns,
            bindings,
            sampling_interval,
            dropped_rows: 0,
        }
    }

    /// Build a dataset from a serialized log
    pub fn from_raw(raw: RawLog, options: &IngestOptions) -> Self {
        Self::from_records(raw.columns, raw.rows, options)
    }

    /// Bind columns to channels and coerce every record
    pub fn from_records<I>(columns: Vec<String>, records: I, options: &IngestOptions) -> Self
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let resolver = ColumnResolver::new(&columns);
        let mut claimed: HashSet<&str> = HashSet::new();

        let time_column = resolver
            .resolve_match(TIME_CANDIDATES, MatchStage::Normalized, &claimed)
            .map(|m| m.column);
        if let Some(time) = time_column {
            claimed.insert(time);
        } else {
            tracing::warn!("Log has no time column; every row will be dropped");
        }

        // Strict stages for every channel first so fuzzy keyword matches
        // cannot steal a column another channel names outright
        let mut bound: BTreeMap<Channel, &str> = BTreeMap::new();
        for stage in [MatchStage::Normalized, MatchStage::Keyword] {
            for channel in Channel::ALL {
                if bound.contains_key(&channel) {
                    continue;
                }
                let candidates = options.candidates_for(channel);
                if let Some(m) = resolver.resolve_match(&candidates, stage, &claimed) {
                    tracing::debug!("{} -> '{}' ({:?})", channel.label(), m.column, m.stage);
                    claimed.insert(m.column);
                    bound.insert(channel, m.column);
                }
            }
        }

        let index_of = |name: &str| columns.iter().position(|c| c == name);
        let time_idx = time_column.and_then(index_of);
        let channel_idx: Vec<(Channel, usize, bool)> = bound
            .iter()
            .filter_map(|(&channel, &name)| {
                let fahrenheit = channel.is_temperature() && is_fahrenheit_header(name);
                index_of(name).map(|i| (channel, i, fahrenheit))
            })
            .collect();

        let mut rows = Vec::new();
        let mut dropped_rows = 0usize;
        for record in records {
            let Some(time) = time_idx
                .and_then(|i| record.get(i))
                .and_then(coerce_f64)
            else {
                dropped_rows += 1;
                continue;
            };

            let mut row = LogRow::at(time);
            for &(channel, i, fahrenheit) in &channel_idx {
                let mut value = record.get(i).and_then(coerce_f64).unwrap_or(0.0);
                if fahrenheit {
                    value = fahrenheit_to_celsius(value);
                }
                *row.slot_mut(channel) = Some(value);
            }
            rows.push(row);
        }

        for channel in [Channel::LambdaTarget, Channel::LambdaMeasured] {
            normalize_lambda(&mut rows, channel, options.stoich_afr);
        }

        if dropped_rows > 0 {
            tracing::warn!("Dropped {dropped_rows} log rows with an unreadable time");
        }

        let bindings = bound
            .into_iter()
            .map(|(channel, name)| (channel, name.to_string()))
            .collect();

        rows.sort_by(|a, b| a.time.total_cmp(&b.time));
        let sampling_interval = estimate_sampling_interval(&rows);

        Self {
            rows,
            columns,
            bindings,
            sampling_interval,
            dropped_rows,
        }
    }

    /// Time-ordered rows
    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Every column name present in the source log
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Channel to column bindings
    pub fn bindings(&self) -> &BTreeMap<Channel, String> {
        &self.bindings
    }

    /// Column a channel was bound to
    pub fn column_for(&self, channel: Channel) -> Option<&str> {
        self.bindings.get(&channel).map(String::as_str)
    }

    /// Whether a channel was bound
    pub fn has(&self, channel: Channel) -> bool {
        self.bindings.contains_key(&channel)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped during ingestion
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// First and last timestamps
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((self.rows.first()?.time, self.rows.last()?.time))
    }

    /// Estimated seconds represented by one sample
    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    /// Values of one channel, skipping rows where it is absent
    pub fn channel_values(&self, channel: Channel) -> Vec<f64> {
        self.rows.iter().filter_map(|r| r.get(channel)).collect()
    }
}

/// Mean of the first valid inter-sample gaps
///
/// Gaps must be positive and under one second. Falls back to 50 ms and never
/// returns less than 10 ms.
pub fn estimate_sampling_interval(rows: &[LogRow]) -> f64 {
    let gaps: Vec<f64> = rows
        .windows(2)
        .map(|pair| pair[1].time - pair[0].time)
        .filter(|gap| *gap > 0.0 && *gap < MAX_SAMPLING_GAP)
        .take(SAMPLING_GAP_WINDOW)
        .collect();

    if gaps.is_empty() {
        return DEFAULT_SAMPLING_INTERVAL;
    }

    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    mean.max(MIN_SAMPLING_INTERVAL)
}

/// Convert an AFR-valued lambda channel to lambda
fn normalize_lambda(rows: &mut [LogRow], channel: Channel, stoich: f64) {
    let first = rows
        .iter()
        .filter_map(|r| r.get(channel))
        .find(|v| *v > 0.0);
    if !first.is_some_and(looks_like_afr) {
        return;
    }

    tracing::debug!("{} logged as AFR; converting with stoich {stoich}", channel.label());
    for row in rows.iter_mut() {
        if let Some(value) = row.slot_mut(channel).as_mut() {
            *value = afr_to_lambda(*value, stoich);
        }
    }
}

fn fahrenheit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(°\s*f\b|\(\s*f\s*\)|\bdeg\s*f\b|fahrenheit)")
            .expect("valid fahrenheit pattern")
    })
}

fn is_fahrenheit_header(name: &str) -> bool {
    fahrenheit_pattern().is_match(name)
}
