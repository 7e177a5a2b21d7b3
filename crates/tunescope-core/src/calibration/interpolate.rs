//! Table interpolation and bin lookup
//!
//! All lookups clamp to the axis ends. Axes are expected to be strictly
//! ascending; `CalibrationStore::axis` rejects anything else before it
//! reaches these functions.

/// Find surrounding axis indices and interpolation ratio (clamped to edges)
fn find_surrounding_indices(value: f64, axis: &[f64]) -> (usize, usize, f64) {
    if axis.is_empty() {
        return (0, 0, 0.0);
    }

    // Clamp below first breakpoint (NaN lands here too)
    if value.is_nan() || value <= axis[0] {
        return (0, 0, 0.0);
    }

    // Clamp above last breakpoint
    let last_idx = axis.len() - 1;
    if value >= axis[last_idx] {
        return (last_idx, last_idx, 0.0);
    }

    for (i, pair) in axis.windows(2).enumerate() {
        let left = pair[0];
        let right = pair[1];

        if value >= left && value <= right {
            let span = right - left;
            let ratio = if span.abs() < f64::EPSILON {
                0.0
            } else {
                (value - left) / span
            };
            return (i, i + 1, ratio);
        }
    }

    (last_idx, last_idx, 0.0)
}

/// Linear interpolation of `values` over `axis` at `x`
///
/// `x` is clamped to `[axis[0], axis[last]]`. When the two slices differ in
/// length only the common prefix is used.
pub fn interpolate_1d(values: &[f64], axis: &[f64], x: f64) -> f64 {
    let n = values.len().min(axis.len());
    if n == 0 {
        return values.first().copied().unwrap_or(0.0);
    }

    let (i0, i1, t) = find_surrounding_indices(x, &axis[..n]);
    let v0 = values[i0];
    let v1 = values[i1];
    v0 + (v1 - v0) * t
}

/// Bilinear interpolation of `table[row][col]`
///
/// Row and column coordinates are clamped independently. Interpolates along
/// columns at both bracketing rows, then between those along the row axis.
pub fn interpolate_2d(
    table: &[Vec<f64>],
    row_axis: &[f64],
    col_axis: &[f64],
    row_value: f64,
    col_value: f64,
) -> f64 {
    let (r0, r1, tr) = find_surrounding_indices(row_value, row_axis);
    let (c0, c1, tc) = find_surrounding_indices(col_value, col_axis);

    let v00 = cell(table, r0, c0);
    let v01 = cell(table, r0, c1);
    let v10 = cell(table, r1, c0);
    let v11 = cell(table, r1, c1);

    let low = v00 + (v01 - v00) * tc;
    let high = v10 + (v11 - v10) * tc;

    low + (high - low) * tr
}

/// Safe value fetch with bounds checks
fn cell(table: &[Vec<f64>], row: usize, col: usize) -> f64 {
    table
        .get(row)
        .and_then(|r| r.get(col))
        .copied()
        .unwrap_or(0.0)
}

/// Clamped bin lookup used for cell binning
///
/// `value <= axis[0]` maps to bin 0, `value >= axis[last]` to the last bin,
/// otherwise the first `j` with `axis[j] <= value < axis[j + 1]`.
pub fn bin_index(value: f64, axis: &[f64]) -> usize {
    if axis.is_empty() || value.is_nan() || value <= axis[0] {
        return 0;
    }

    let last_idx = axis.len() - 1;
    if value >= axis[last_idx] {
        return last_idx;
    }

    axis.windows(2)
        .position(|pair| pair[0] <= value && value < pair[1])
        .unwrap_or(last_idx)
}

/// Whether an axis is strictly ascending
pub fn is_strictly_ascending(axis: &[f64]) -> bool {
    axis.windows(2).all(|pair| pair[0] < pair[1])
}
