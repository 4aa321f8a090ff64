/// Neural network layers used by the forecasting model.
pub mod batch_norm;
pub mod dropout;
pub mod linear;
pub mod lstm_cell;

pub use batch_norm::{BatchNorm, BatchNormCache, BatchNormGradients};
pub use dropout::Dropout;
pub use linear::{LinearGradients, LinearLayer};
pub use lstm_cell::{LstmCache, LstmCell, LstmGradients};
