use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// The six weather channels every input table must provide, in model order.
pub const CHANNELS: [&str; 6] = [
    "Temperature",
    "Wind Gust",
    "Cloud Cover Total",
    "Mean Sea Level Pressure",
    "Evapotranspiration",
    "Soil Temperature",
];

/// Number of channels the model consumes and predicts.
pub const NUM_CHANNELS: usize = CHANNELS.len();

/// Fraction of samples held out for testing, and again for validation.
pub const SPLIT_FRACTION: f64 = 0.2;

/// Seed for the random sample split, fixed for reproducibility.
pub const SPLIT_SEED: u64 = 42;

/// Adam learning rate.
pub const LEARNING_RATE: f64 = 0.001;

/// Dropout rate applied after each recurrent layer during training.
pub const DROPOUT_RATE: f64 = 0.2;

/// Epochs without validation improvement before training stops early.
pub const PATIENCE: usize = 10;

/// Minimum validation loss decrease that counts as an improvement.
pub const MIN_DELTA: f64 = 1e-6;

/// Hidden sizes of the two stacked LSTM layers.
pub const HIDDEN_SIZE_1: usize = 64;
pub const HIDDEN_SIZE_2: usize = 64;

/// Width of the fully connected ReLU layer before the output head.
pub const DENSE_SIZE: usize = 32;

/// Per-matrix gradient clipping norm, guards against exploding gradients.
pub const CLIP_NORM: f64 = 5.0;

/// Tunables exposed to the presentation shell.
///
/// Everything else about the pipeline (split fractions, seed, learning rate,
/// dropout, patience, layer widths) is a fixed internal constant of this
/// module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of consecutive time steps in one input window.
    pub sequence_length: usize,
    /// Upper bound on training epochs; early stopping usually ends sooner.
    pub max_epochs: usize,
    /// Mini-batch size for training and inference.
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sequence_length: 24,
            max_epochs: 100,
            batch_size: 32,
        }
    }
}

impl PipelineConfig {
    /// Check every tunable against its allowed range.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(1..=168).contains(&self.sequence_length) {
            return Err(ForecastError::InvalidConfig(format!(
                "sequence_length must be in 1..=168, got {}",
                self.sequence_length
            )));
        }
        if !(1..=500).contains(&self.max_epochs) {
            return Err(ForecastError::InvalidConfig(format!(
                "max_epochs must be in 1..=500, got {}",
                self.max_epochs
            )));
        }
        if !(1..=256).contains(&self.batch_size) {
            return Err(ForecastError::InvalidConfig(format!(
                "batch_size must be in 1..=256, got {}",
                self.batch_size
            )));
        }
        Ok(())
    }
}
