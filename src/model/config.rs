//! Model configuration

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Configuration for the pointer-generator model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Fixed in-vocabulary size (reserved tokens included)
    pub vocab_size: usize,
    /// Word embedding dimension
    pub emb_dim: usize,
    /// Recurrent hidden dimension; encoder states are `2 * hidden_dim`
    pub hidden_dim: usize,
    /// Source truncation length
    pub max_enc_steps: usize,
    /// Decode length; supervision, sampling, and rollouts all run to this
    pub max_dec_steps: usize,
    /// Track coverage and add the coverage bias to attention scores
    pub coverage: bool,
    /// Weight of the coverage loss in the supervised objective
    pub cov_loss_weight: f32,
    /// Floor added to every fused-distribution entry before taking logs
    pub epsilon: f32,
    /// Standard deviation for weight initialization
    pub init_std: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: 50_000,
            emb_dim: 128,
            hidden_dim: 256,
            max_enc_steps: 400,
            max_dec_steps: 100,
            coverage: true,
            cov_loss_weight: 1.0,
            epsilon: f32::EPSILON,
            init_std: 1e-2,
        }
    }
}

impl ModelConfig {
    /// Small configuration for tests.
    #[must_use]
    pub fn tiny() -> Self {
        Self {
            vocab_size: 20,
            emb_dim: 8,
            hidden_dim: 12,
            max_enc_steps: 10,
            max_dec_steps: 6,
            coverage: true,
            cov_loss_weight: 1.0,
            epsilon: f32::EPSILON,
            init_std: 0.1,
        }
    }

    /// Check structural invariants before the model allocates weights.
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size < 4 {
            return Err(ModelError::InvalidConfig(
                "vocab_size must cover the four reserved tokens".to_string(),
            ));
        }
        if self.emb_dim == 0 || self.hidden_dim == 0 {
            return Err(ModelError::InvalidConfig(
                "emb_dim and hidden_dim must be non-zero".to_string(),
            ));
        }
        if self.max_dec_steps == 0 {
            return Err(ModelError::InvalidConfig(
                "max_dec_steps must be non-zero".to_string(),
            ));
        }
        if self.epsilon <= 0.0 {
            return Err(ModelError::InvalidConfig(
                "epsilon must be positive to floor log-probabilities".to_string(),
            ));
        }
        Ok(())
    }
}
