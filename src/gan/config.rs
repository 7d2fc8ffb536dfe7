//! Configuration for adversarial fine-tuning

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Rollout and reward-blending settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GanConfig {
    /// Monte-Carlo rollouts per truncation point (`N`)
    pub rollout_num: usize,
    /// First truncation point; earlier steps get zero reward, bounding
    /// rollout cost
    pub rollout_start: usize,
    /// Blend ratio `r`: 0 = discriminator reward only, 1 = similarity
    /// reward only
    pub similarity_ratio: f32,
}

impl Default for GanConfig {
    fn default() -> Self {
        Self {
            rollout_num: 16,
            rollout_start: 1,
            similarity_ratio: 0.5,
        }
    }
}

impl GanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rollout_num == 0 {
            return Err(ModelError::InvalidConfig("rollout_num must be >= 1".to_string()));
        }
        if self.rollout_start == 0 {
            return Err(ModelError::InvalidConfig(
                "rollout_start must be >= 1 so every rewarded step has a frozen prefix".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_ratio) {
            return Err(ModelError::InvalidConfig(
                "similarity_ratio must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the conditional sequence discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    /// Extended-vocabulary width the discriminator accepts
    pub vocab_size: usize,
    /// Sequences are padded or truncated to this length
    pub max_seq_len: usize,
    /// Token embedding dimension
    pub embed_dim: usize,
    /// Dense layer sizes after the pooled embeddings
    pub hidden_dims: Vec<usize>,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            vocab_size: 50_000,
            max_seq_len: 120,
            embed_dim: 64,
            hidden_dims: vec![128, 64],
        }
    }
}

impl DiscriminatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 || self.embed_dim == 0 || self.max_seq_len == 0 {
            return Err(ModelError::InvalidConfig(
                "discriminator dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs_valid() {
        assert!(GanConfig::default().validate().is_ok());
        assert!(DiscriminatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_rollouts_rejected() {
        let config = GanConfig { rollout_num: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blend_ratio_bounds() {
        let config = GanConfig { similarity_ratio: 1.2, ..Default::default() };
        assert!(config.validate().is_err());
        let config = GanConfig { similarity_ratio: -0.1, ..Default::default() };
        assert!(config.validate().is_err());
        let config = GanConfig { similarity_ratio: 1.0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gan_config_serde_roundtrip() {
        let config = GanConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: GanConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rollout_num, config.rollout_num);
    }
}
