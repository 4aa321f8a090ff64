use ndarray::Array2;
use serde::Serialize;

use crate::config::CHANNELS;
use crate::model::network::ForecastNetwork;
use crate::model::trainer::collate;
use crate::scaler::MinMaxScaler;
use crate::windowing::WindowSample;

/// Test-set results in original physical units.
///
/// The three metrics are computed jointly over every channel and every test
/// sample, not per channel. The paired arrays are kept for downstream
/// inspection and plotting by the presentation shell.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// (samples, channels) true targets, inverse-scaled.
    pub actual: Array2<f64>,
    /// (samples, channels) model predictions, inverse-scaled.
    pub predicted: Array2<f64>,
}

impl EvaluationReport {
    /// Paired (actual, predicted) sequences for one named channel.
    pub fn channel_series(&self, channel: &str) -> Option<(Vec<f64>, Vec<f64>)> {
        let c = CHANNELS.iter().position(|name| *name == channel)?;
        Some((
            self.actual.column(c).to_vec(),
            self.predicted.column(c).to_vec(),
        ))
    }

    /// False when training quietly diverged and the metrics are unusable.
    pub fn is_finite(&self) -> bool {
        self.mae.is_finite() && self.rmse.is_finite() && self.r2.is_finite()
    }
}

/// Run inference over the test split and score it in physical units.
///
/// Both predictions and targets are mapped back through the single scaler
/// fitted on the full table; the scaler must never be refit on a subset.
pub fn evaluate(
    network: &mut ForecastNetwork,
    test: &[WindowSample],
    scaler: &MinMaxScaler,
    batch_size: usize,
) -> EvaluationReport {
    network.eval();

    let channels = scaler.num_columns();
    let mut scaled_actual = Array2::zeros((test.len(), channels));
    let mut scaled_predicted = Array2::zeros((test.len(), channels));

    let indices: Vec<usize> = (0..test.len()).collect();
    for chunk in indices.chunks(batch_size) {
        let batch = collate(test, chunk);
        let prediction = network.predict(&batch.steps);

        for (b, &idx) in chunk.iter().enumerate() {
            for c in 0..channels {
                scaled_actual[[idx, c]] = batch.targets[[c, b]];
                scaled_predicted[[idx, c]] = prediction[[c, b]];
            }
        }
    }

    let actual = scaler.inverse_transform(&scaled_actual);
    let predicted = scaler.inverse_transform(&scaled_predicted);

    let (mae, rmse, r2) = joint_metrics(&actual, &predicted);

    EvaluationReport {
        mae,
        rmse,
        r2,
        actual,
        predicted,
    }
}

/// MAE, RMSE and R² over all entries of the paired arrays at once.
fn joint_metrics(actual: &Array2<f64>, predicted: &Array2<f64>) -> (f64, f64, f64) {
    let n = actual.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    for (a, p) in actual.iter().zip(predicted.iter()) {
        let diff = a - p;
        abs_sum += diff.abs();
        sq_sum += diff * diff;
    }
    let mae = abs_sum / n;
    let rmse = (sq_sum / n).sqrt();

    let mean = actual.sum() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    // Zero total variance would make R² undefined; report 0.0 so the
    // divergence check stays meaningful.
    let r2 = if ss_tot > 0.0 { 1.0 - sq_sum / ss_tot } else { 0.0 };

    (mae, rmse, r2)
}
