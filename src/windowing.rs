use ndarray::{s, Array1, Array2};

use crate::error::ForecastError;

/// One supervised sample: `sequence_length` consecutive scaled observation
/// vectors paired with the scaled observation immediately following them.
///
/// Materialized once from the scaled table and immutable thereafter.
#[derive(Debug, Clone)]
pub struct WindowSample {
    /// (sequence_length, channels)
    pub input: Array2<f64>,
    /// (channels,) — the row right after the window.
    pub target: Array1<f64>,
}

/// Slice a scaled (T, C) table into `T - L` overlapping stride-1 windows.
///
/// Sample i's input is rows `[i, i+L)` and its target is row `i + L`.
/// `T <= L` cannot produce a single sample and is a configuration error,
/// not an empty training set.
pub fn make_windows(
    scaled: &Array2<f64>,
    sequence_length: usize,
) -> Result<Vec<WindowSample>, ForecastError> {
    let rows = scaled.nrows();
    if rows <= sequence_length {
        return Err(ForecastError::InsufficientData {
            rows,
            sequence_length,
        });
    }

    let mut samples = Vec::with_capacity(rows - sequence_length);
    for i in 0..rows - sequence_length {
        let input = scaled.slice(s![i..i + sequence_length, ..]).to_owned();
        let target = scaled.row(i + sequence_length).to_owned();
        samples.push(WindowSample { input, target });
    }
    Ok(samples)
}
