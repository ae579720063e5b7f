//! LSTM configuration

use crate::config::SequenceConfig;
use serde::{Deserialize, Serialize};

/// Activation applied to the cell candidate and the cell output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellActivation {
    Tanh,
    Relu,
}

impl CellActivation {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            CellActivation::Tanh => v.tanh(),
            CellActivation::Relu => v.max(0.0),
        }
    }

    /// Derivative given the pre-activation and the activated value
    pub fn derivative(self, pre: f64, out: f64) -> f64 {
        match self {
            CellActivation::Tanh => 1.0 - out * out,
            CellActivation::Relu => {
                if pre > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// LSTM model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LSTMConfig {
    /// Number of input features per time step
    pub input_size: usize,
    /// Hidden state size
    pub hidden_size: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Global gradient-norm clip
    pub gradient_clip: Option<f64>,
    /// Cell activation
    pub activation: CellActivation,
    /// Seed for weight init and batch order
    pub seed: u64,
}

impl LSTMConfig {
    /// Create a configuration with default training parameters
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of input features
    /// * `hidden_size` - Hidden state size
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            learning_rate: 0.001,
            gradient_clip: Some(1.0),
            activation: CellActivation::Relu,
            seed: 42,
        }
    }

    /// Configuration for `input_size` features from the sequence settings
    pub fn from_settings(input_size: usize, settings: &SequenceConfig) -> Self {
        Self::new(input_size, settings.hidden_size)
            .with_learning_rate(settings.learning_rate)
            .with_seed(settings.seed)
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_gradient_clip(mut self, clip: Option<f64>) -> Self {
        self.gradient_clip = clip;
        self
    }

    pub fn with_activation(mut self, activation: CellActivation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
