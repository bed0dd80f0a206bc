pub mod conv_lstm_model;
pub mod recurrent;

pub use conv_lstm_model::ConvLstmModel;
pub use recurrent::{RecurrentModel, TrainStep};
