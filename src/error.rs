use thiserror::Error;

/// Errors surfaced by the forecasting pipeline.
///
/// Input-shape and configuration errors abort a run before any processing;
/// numerical edge cases inside the pipeline are handled locally and never
/// reach this enum, with the exception of training divergence which must be
/// reported rather than presented as a valid result.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("failed to read input table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse input table: {0}")]
    Csv(#[from] csv::Error),

    /// The input table has no timestamp-like column at all.
    #[error("input table has no timestamp column (expected one of: timestamp, time, date, datetime)")]
    MissingTimestampColumn,

    /// A required weather channel is absent from the header row.
    #[error("input table is missing required column \"{0}\"")]
    MissingColumn(String),

    #[error("row {row}: unparseable timestamp {value:?}")]
    BadTimestamp { row: usize, value: String },

    /// Forward-fill cannot resolve a missing value with no prior observation.
    #[error("column \"{column}\" starts with a missing value and has no prior observation to fill from")]
    LeadingGap { column: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Too few rows to produce any training samples for the requested
    /// sequence length, or a split partition came out empty.
    #[error("insufficient data: {rows} usable samples for sequence length {sequence_length}")]
    InsufficientData { rows: usize, sequence_length: usize },

    /// Training loss became non-finite; the model is unusable.
    #[error("training diverged at epoch {epoch} (loss {loss})")]
    TrainingDiverged { epoch: usize, loss: f64 },
}
