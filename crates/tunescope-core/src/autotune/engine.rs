//! Fuel table correction analysis

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::bins::{Bin, BinGrid, FuelMode};
use super::error::AutotuneError;
use super::filter::AutotuneFilters;
use crate::calibration::defaults::{DEFAULT_PE_ENABLE_LOAD, DEFAULT_PE_ENABLE_THROTTLE};
use crate::calibration::{bin_index, CalibrationStore};
use crate::log::{Channel, LogDataset};

/// Channels every autotune run needs
pub const REQUIRED_CHANNELS: [Channel; 7] = [
    Channel::Rpm,
    Channel::Load,
    Channel::Throttle,
    Channel::LambdaTarget,
    Channel::LambdaMeasured,
    Channel::ShortTermTrim,
    Channel::LongTermTrim,
];

/// Autotune settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotuneOptions {
    /// Bins with fewer rows are left alone
    pub min_samples: usize,
    /// Largest change applied to one cell, percent of its current value
    pub change_limit_percent: f64,
    /// Rows failing these are not binned
    pub filters: AutotuneFilters,
}

impl Default for AutotuneOptions {
    fn default() -> Self {
        Self {
            min_samples: 10,
            change_limit_percent: 10.0,
            filters: AutotuneFilters::default(),
        }
    }
}

/// A suggested change to one fuel table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionCell {
    /// Regime the correction came from
    pub mode: FuelMode,
    /// Fuel table row
    pub rpm_index: usize,
    /// Fuel table column
    pub load_index: usize,
    /// Axis breakpoints of the cell
    pub rpm: f64,
    /// Load breakpoint of the cell
    pub load: f64,
    /// Rows in the bin
    pub sample_count: usize,
    /// Mean lambda ratio (open loop) or mean combined trim % (closed loop)
    pub mean: f64,
    /// Value in the loaded calibration
    pub current: f64,
    /// Unclamped suggestion
    pub suggested: f64,
    /// Value written to the corrected table
    pub applied: f64,
    /// Unclamped change, percent of `current`
    pub change_pct: f64,
    /// Change actually applied, percent of `current`
    pub applied_change_pct: f64,
    /// The change limit cut this suggestion
    pub clamped: bool,
    /// `suggested - applied`
    pub clamp_delta: f64,
}

/// How the log rows were used
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RowAccounting {
    /// Rows in the log
    pub total: usize,
    /// Rows binned as open loop
    pub open_loop: usize,
    /// Rows binned as closed loop
    pub closed_loop: usize,
    /// Rejected by [`AutotuneFilters`]
    pub filtered: usize,
    /// Open-loop rows without a usable measured lambda
    pub skipped: usize,
}

/// Result of one autotune analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutotuneReport {
    /// Fuel table map id
    pub table_id: String,
    /// Map id of the rpm axis
    pub rpm_axis_id: String,
    /// Map id of the load axis
    pub load_axis_id: String,
    /// Rpm breakpoints (table rows)
    pub rpm_axis: Vec<f64>,
    /// Load breakpoints (table columns)
    pub load_axis: Vec<f64>,
    /// Table as loaded
    pub current_table: Vec<Vec<f64>>,
    /// Table with the applied corrections
    pub corrected_table: Vec<Vec<f64>>,
    /// Corrections from lambda ratios
    pub open_loop_cells: Vec<CorrectionCell>,
    /// Corrections from fuel trims
    pub closed_loop_cells: Vec<CorrectionCell>,
    /// Distinct cells that received a correction
    pub modified_cell_count: usize,
    /// Every correction cut by the change limit, either mode
    pub clamped_cells: Vec<CorrectionCell>,
    /// Corrected table with one decimal, as calibration files store it
    pub formatted_table: Vec<Vec<String>>,
    /// Row usage
    pub rows: RowAccounting,
    /// Options the report was computed with
    pub min_samples: usize,
    /// Change limit the report was computed with
    pub change_limit_percent: f64,
}

impl AutotuneReport {
    /// Table dimensions as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rpm_axis.len(), self.load_axis.len())
    }

    /// All correction cells, closed loop first
    pub fn cells(&self) -> impl Iterator<Item = &CorrectionCell> {
        self.closed_loop_cells.iter().chain(&self.open_loop_cells)
    }
}

/// Fuel table axes and values resolved from the calibration
struct FuelTable {
    id: String,
    rpm_axis_id: String,
    load_axis_id: String,
    rpm_axis: Vec<f64>,
    load_axis: Vec<f64>,
    values: Vec<Vec<f64>>,
}

/// Computes fuel table corrections from a log and the loaded calibration
pub struct AutotuneEngine<'a> {
    calibration: &'a CalibrationStore,
    dataset: &'a LogDataset,
}

impl<'a> AutotuneEngine<'a> {
    /// Engine over a loaded calibration and a log
    pub fn new(calibration: &'a CalibrationStore, dataset: &'a LogDataset) -> Self {
        Self {
            calibration,
            dataset,
        }
    }

    /// Calibration the corrections are computed against
    pub fn calibration(&self) -> &'a CalibrationStore {
        self.calibration
    }

    /// Bin the log by fuel table cell and suggest bounded corrections
    pub fn analyze(&self, options: &AutotuneOptions) -> Result<AutotuneReport, AutotuneError> {
        if !self.calibration.is_loaded() {
            return Err(AutotuneError::CalibrationNotLoaded);
        }
        if self.dataset.is_empty() {
            return Err(AutotuneError::NoLogRows);
        }
        for channel in REQUIRED_CHANNELS {
            if !self.dataset.has(channel) {
                return Err(AutotuneError::MissingColumn {
                    role: channel.label().to_string(),
                    candidates: channel
                        .default_candidates()
                        .iter()
                        .map(|c| c.to_string())
                        .collect(),
                });
            }
        }

        let table = self.fuel_table()?;
        let (pe_load, pe_throttle) = self.pe_enable(table.rpm_axis.len())?;

        let mut open_bins = BinGrid::new();
        let mut closed_bins = BinGrid::new();
        let mut rows = RowAccounting {
            total: self.dataset.len(),
            ..RowAccounting::default()
        };

        let mut filter = options.filters.compile();
        for row in self.dataset.rows() {
            if !filter.passes(row) {
                rows.filtered += 1;
                continue;
            }
            let value = |channel| row.get(channel).unwrap_or(0.0);
            let (rpm, load, throttle) = (value(Channel::Rpm), value(Channel::Load), value(Channel::Throttle));
            let target = value(Channel::LambdaTarget);

            let r = bin_index(rpm, &table.rpm_axis);
            let c = bin_index(load, &table.load_axis);

            let open_loop = target > 0.0
                && target < 1.0
                && load >= pe_load[r]
                && throttle >= pe_throttle[r];

            if open_loop {
                let measured = value(Channel::LambdaMeasured);
                if measured <= 0.0 {
                    rows.skipped += 1;
                    continue;
                }
                open_bins.add(r, c, measured / target);
                rows.open_loop += 1;
            } else {
                let trim = value(Channel::ShortTermTrim) + value(Channel::LongTermTrim);
                closed_bins.add(r, c, trim);
                rows.closed_loop += 1;
            }
        }
        filter.report();

        tracing::info!(
            "Autotune binned {} open-loop and {} closed-loop rows into {} + {} cells",
            rows.open_loop,
            rows.closed_loop,
            open_bins.len(),
            closed_bins.len()
        );

        let closed_loop_cells = summarize(&table, &closed_bins, FuelMode::ClosedLoop, options);
        let open_loop_cells = summarize(&table, &open_bins, FuelMode::OpenLoop, options);

        // Open loop is applied last and wins where both modes hit a cell
        let mut corrected_table = table.values.clone();
        let mut modified = HashSet::new();
        for cell in closed_loop_cells.iter().chain(&open_loop_cells) {
            corrected_table[cell.rpm_index][cell.load_index] = cell.applied;
            modified.insert((cell.rpm_index, cell.load_index));
        }

        let clamped_cells: Vec<CorrectionCell> = closed_loop_cells
            .iter()
            .chain(&open_loop_cells)
            .filter(|c| c.clamped)
            .cloned()
            .collect();

        let formatted_table = corrected_table
            .iter()
            .map(|row| row.iter().map(|v| format!("{v:.1}")).collect())
            .collect();

        tracing::info!(
            "Autotune suggests {} cell changes ({} clamped at {}%)",
            modified.len(),
            clamped_cells.len(),
            options.change_limit_percent
        );

        Ok(AutotuneReport {
            table_id: table.id,
            rpm_axis_id: table.rpm_axis_id,
            load_axis_id: table.load_axis_id,
            rpm_axis: table.rpm_axis,
            load_axis: table.load_axis,
            current_table: table.values,
            corrected_table,
            open_loop_cells,
            closed_loop_cells,
            modified_cell_count: modified.len(),
            clamped_cells,
            formatted_table,
            rows,
            min_samples: options.min_samples,
            change_limit_percent: options.change_limit_percent,
        })
    }

    /// Write a report's corrected table into a copy of the calibration
    ///
    /// With `base`, the copy is of that document instead; its table and axis
    /// dimensions must match the analysis calibration.
    pub fn export_corrected_calibration(
        &self,
        report: &AutotuneReport,
        base: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, AutotuneError> {
        super::export::export_corrected(self.calibration, report, base)
    }

    fn fuel_table(&self) -> Result<FuelTable, AutotuneError> {
        let cal = self.calibration;
        let ids = cal.map_ids();
        let (rpm_axis_id, load_axis_id) =
            cal.table_axes(&ids.fuel_table, &ids.fuel_rpm_axis, &ids.fuel_load_axis);

        let rpm_axis = self.axis(&rpm_axis_id)?;
        let load_axis = self.axis(&load_axis_id)?;
        let values = cal
            .get_table(&ids.fuel_table)
            .ok_or_else(|| AutotuneError::MissingTable(ids.fuel_table.clone()))?;

        let expected = (rpm_axis.len(), load_axis.len());
        if values.len() != expected.0 || values.iter().any(|r| r.len() != expected.1) {
            let cols = values.first().map(Vec::len).unwrap_or(0);
            return Err(AutotuneError::TableShapeMismatch {
                table: ids.fuel_table.clone(),
                expected,
                found: (values.len(), cols),
            });
        }

        Ok(FuelTable {
            id: ids.fuel_table.clone(),
            rpm_axis_id,
            load_axis_id,
            rpm_axis,
            load_axis,
            values,
        })
    }

    fn axis(&self, id: &str) -> Result<Vec<f64>, AutotuneError> {
        match self.calibration.get_array(id) {
            None => Err(AutotuneError::MissingAxis(id.to_string())),
            Some(values) if values.is_empty() => Err(AutotuneError::MissingAxis(id.to_string())),
            Some(_) => self
                .calibration
                .axis(id)
                .ok_or_else(|| AutotuneError::InvalidAxis(id.to_string())),
        }
    }

    /// PE entry thresholds per RPM breakpoint
    fn pe_enable(&self, rpm_len: usize) -> Result<(Vec<f64>, Vec<f64>), AutotuneError> {
        let ids = self.calibration.map_ids();
        let per_rpm = |id: &str, default: f64| match self.calibration.get_array(id) {
            None => Ok(vec![default; rpm_len]),
            Some(values) if values.len() == rpm_len => Ok(values),
            Some(values) => Err(AutotuneError::PeEnableMismatch {
                map: id.to_string(),
                expected: rpm_len,
                found: values.len(),
            }),
        };
        Ok((
            per_rpm(&ids.pe_enable_load, DEFAULT_PE_ENABLE_LOAD)?,
            per_rpm(&ids.pe_enable_throttle, DEFAULT_PE_ENABLE_THROTTLE)?,
        ))
    }
}

fn summarize(
    table: &FuelTable,
    bins: &BinGrid,
    mode: FuelMode,
    options: &AutotuneOptions,
) -> Vec<CorrectionCell> {
    bins.qualifying(options.min_samples)
        .map(|bin| correction(table, bin, mode, options.change_limit_percent))
        .collect()
}

fn correction(table: &FuelTable, bin: &Bin, mode: FuelMode, limit: f64) -> CorrectionCell {
    let current = table.values[bin.rpm_index][bin.load_index];
    let mean = bin.mean();
    let suggested = match mode {
        FuelMode::OpenLoop => current * mean,
        FuelMode::ClosedLoop => current * (1.0 + mean / 100.0),
    };
    let change_pct = percent_change(current, suggested);
    let (applied, clamped) = apply_change_limit(current, suggested, limit);

    CorrectionCell {
        mode,
        rpm_index: bin.rpm_index,
        load_index: bin.load_index,
        rpm: table.rpm_axis[bin.rpm_index],
        load: table.load_axis[bin.load_index],
        sample_count: bin.count,
        mean,
        current,
        suggested,
        applied,
        change_pct,
        applied_change_pct: percent_change(current, applied),
        clamped,
        clamp_delta: suggested - applied,
    }
}

/// Percent change from `current`; zero when `current` is zero
pub fn percent_change(current: f64, suggested: f64) -> f64 {
    if current == 0.0 {
        0.0
    } else {
        (suggested - current) / current * 100.0
    }
}

/// Clamp a suggestion to within `limit` percent of the current value
///
/// Returns the applied value and whether clamping happened. The limit is
/// always measured against the value the analysis ran with.
pub fn apply_change_limit(current: f64, suggested: f64, limit: f64) -> (f64, bool) {
    let change = percent_change(current, suggested);
    if change.abs() <= limit {
        return (suggested, false);
    }
    let bounded = current * (1.0 + limit.copysign(change) / 100.0);
    (bounded, true)
}
