use ndarray::{Array1, Array2, Axis};

/// Per-column min-max normalization into [0, 1].
///
/// Fitted exactly once over the full table before windowing so that train,
/// validation and test partitions share a single scaling. A column with zero
/// fitted range is treated as a no-op: transform maps it to 0.0 and the
/// inverse returns the fitted minimum, so no division by zero can occur.
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    mins: Array1<f64>,
    ranges: Array1<f64>,
}

impl MinMaxScaler {
    /// Compute per-column (min, max) over every row of `table`.
    pub fn fit(table: &Array2<f64>) -> Self {
        let cols = table.ncols();
        let mut mins = Array1::from_elem(cols, f64::INFINITY);
        let mut maxs = Array1::from_elem(cols, f64::NEG_INFINITY);

        for row in table.axis_iter(Axis(0)) {
            for (j, &value) in row.iter().enumerate() {
                mins[j] = mins[j].min(value);
                maxs[j] = maxs[j].max(value);
            }
        }

        let ranges = &maxs - &mins;
        MinMaxScaler { mins, ranges }
    }

    /// Map every value linearly into [0, 1] using the fitted ranges.
    pub fn transform(&self, table: &Array2<f64>) -> Array2<f64> {
        let mut scaled = table.clone();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            for (j, value) in row.iter_mut().enumerate() {
                *value = if self.ranges[j] > 0.0 {
                    (*value - self.mins[j]) / self.ranges[j]
                } else {
                    0.0
                };
            }
        }
        scaled
    }

    /// Fit on `table` and return its scaled copy.
    pub fn fit_transform(table: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(table);
        let scaled = scaler.transform(table);
        (scaler, scaled)
    }

    /// Exact algebraic inverse of [`transform`](Self::transform), applied
    /// independently per column. Rows are scaled observation vectors.
    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> Array2<f64> {
        let mut original = scaled.clone();
        for mut row in original.axis_iter_mut(Axis(0)) {
            for (j, value) in row.iter_mut().enumerate() {
                *value = if self.ranges[j] > 0.0 {
                    *value * self.ranges[j] + self.mins[j]
                } else {
                    self.mins[j]
                };
            }
        }
        original
    }

    pub fn num_columns(&self) -> usize {
        self.mins.len()
    }
}
