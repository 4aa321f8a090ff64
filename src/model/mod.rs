/// The forecasting network and its training loop.
pub mod network;

/// Mini-batch trainer with early stopping.
pub mod trainer;
