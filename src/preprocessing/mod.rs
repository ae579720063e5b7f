//! Feature preprocessing for both models
//!
//! - `scaler` - training-fitted mean imputer + standard scaler
//! - `windows` - sliding windows and minibatches for the LSTM

mod scaler;
mod windows;

pub use scaler::Preprocessor;
pub use windows::SequenceGenerator;
