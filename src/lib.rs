//! # Weathercast
//!
//! Multivariate weather forecasting from historical sensor readings with a
//! stacked LSTM regressor.
//!
//! ## Core Components
//!
//! - **Data**: CSV ingestion with strict schema checks and forward-fill
//! - **Scaler**: per-channel min-max normalization with exact inverse
//! - **Windowing**: overlapping fixed-length windows with next-step targets
//! - **Split**: seeded random or temporal train/validation/test partitioning
//! - **Model**: two stacked LSTM layers with dropout, batch norm and a dense
//!   head, trained with Adam, MSE and validation-based early stopping
//! - **Evaluation**: MAE, RMSE and R² in original physical units
//!
//! ## Quick Start
//!
//! ```no_run
//! use weathercast::{PipelineConfig, WeatherTable};
//!
//! # fn main() -> Result<(), weathercast::ForecastError> {
//! let table = WeatherTable::from_csv_path("weather.csv")?;
//! let report = weathercast::run(&table, &PipelineConfig::default())?;
//!
//! println!("MAE {:.3}, RMSE {:.3}, R² {:.3}",
//!          report.evaluation.mae, report.evaluation.rmse, report.evaluation.r2);
//! let (actual, predicted) = report.evaluation.channel_series("Temperature").unwrap();
//! # let _ = (actual, predicted);
//! # Ok(())
//! # }
//! ```

/// Main library module.
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod layers;
pub mod loss;
pub mod model;
pub mod optimizers;
pub mod pipeline;
pub mod scaler;
pub mod split;
pub mod utils;
pub mod windowing;

// Re-export commonly used items
pub use config::{PipelineConfig, CHANNELS, NUM_CHANNELS};
pub use data::WeatherTable;
pub use error::ForecastError;
pub use evaluate::{evaluate, EvaluationReport};
pub use model::network::ForecastNetwork;
pub use model::trainer::{create_trainer, EarlyStopper, Trainer, TrainingReport};
pub use pipeline::{run, RunReport};
pub use scaler::MinMaxScaler;
pub use split::{split, SplitPolicy, SplitSets};
pub use windowing::{make_windows, WindowSample};
