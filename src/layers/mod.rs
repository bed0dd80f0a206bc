pub mod dense;
pub mod conv_lstm;

pub use dense::{Dense, DenseOutput};
pub use conv_lstm::{ConvLstmCell, CellGradients};
