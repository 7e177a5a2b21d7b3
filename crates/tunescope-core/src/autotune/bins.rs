//! Per-cell accumulation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fueling regime a row was binned under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelMode {
    /// Power enrichment; accumulates measured/target lambda ratios
    OpenLoop,
    /// Feedback fueling; accumulates STFT + LTFT percentages
    ClosedLoop,
}

/// Accumulator for one calibration cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    /// Row index in the fuel table
    pub rpm_index: usize,
    /// Column index in the fuel table
    pub load_index: usize,
    /// Rows accumulated
    pub count: usize,
    /// Sum of the accumulated values
    pub sum: f64,
}

impl Bin {
    /// Mean of the accumulated values, 0 when empty
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Bins keyed by `(rpm_index, load_index)`, iterated in row-major order
#[derive(Debug, Clone, Default)]
pub struct BinGrid {
    bins: BTreeMap<(usize, usize), Bin>,
}

impl BinGrid {
    /// Empty grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one value into a cell
    pub fn add(&mut self, rpm_index: usize, load_index: usize, value: f64) {
        let bin = self
            .bins
            .entry((rpm_index, load_index))
            .or_insert_with(|| Bin {
                rpm_index,
                load_index,
                ..Bin::default()
            });
        bin.count += 1;
        bin.sum += value;
    }

    /// Bin for a cell, if any row landed there
    pub fn get(&self, rpm_index: usize, load_index: usize) -> Option<&Bin> {
        self.bins.get(&(rpm_index, load_index))
    }

    /// Number of cells with at least one row
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// True when no row has been binned
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bins holding at least `min_samples` rows
    pub fn qualifying(&self, min_samples: usize) -> impl Iterator<Item = &Bin> {
        self.bins.values().filter(move |b| b.count >= min_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_and_floor() {
        let mut grid = BinGrid::new();
        grid.add(1, 2, 1.0);
        grid.add(1, 2, 3.0);
        grid.add(0, 0, 5.0);

        let bin = grid.get(1, 2).unwrap();
        assert_eq!(bin.count, 2);
        assert!((bin.mean() - 2.0).abs() < 1e-9);
        assert_eq!(grid.qualifying(2).count(), 1);
        assert_eq!(grid.qualifying(1).count(), 2);
    }
}
