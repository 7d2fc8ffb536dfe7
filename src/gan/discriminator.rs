//! Conditional sequence discriminator
//!
//! Scores a token sequence as real or generated, conditioned on the
//! source it is supposed to summarize. Sequence and condition share one
//! embedding table; each is mean-pooled over its non-pad positions, the
//! pooled vectors are concatenated and pushed through leaky-ReLU dense
//! layers to a single sigmoid logit.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::DiscriminatorConfig;
use super::Critic;
use crate::error::Result;

/// Discriminator network: probability that a sequence is real.
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    /// `[vocab_size, embed_dim]`
    embeddings: Array2<f32>,
    weights: Vec<Array2<f32>>,
    biases: Vec<Array1<f32>>,
}

impl Discriminator {
    /// Create a discriminator with OS-seeded weights.
    pub fn new(config: DiscriminatorConfig) -> Result<Self> {
        let mut rng = StdRng::from_os_rng();
        Self::init(config, &mut rng)
    }

    /// Create a discriminator with reproducible weights.
    pub fn with_seed(config: DiscriminatorConfig, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::init(config, &mut rng)
    }

    fn init<R: Rng>(config: DiscriminatorConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let sample_normal = |rng: &mut R, std: f64| -> f32 {
            let u1: f64 = rng.random::<f64>().max(1e-10);
            let u2: f64 = rng.random::<f64>();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            (z * std) as f32
        };

        let embed_std = (1.0 / config.embed_dim as f64).sqrt();
        let embeddings = Array2::from_shape_fn((config.vocab_size, config.embed_dim), |_| {
            sample_normal(rng, embed_std)
        });

        // pooled sequence + pooled condition
        let mut dims = vec![2 * config.embed_dim];
        dims.extend(&config.hidden_dims);
        dims.push(1);

        let mut weights = Vec::new();
        let mut biases = Vec::new();
        for i in 0..dims.len() - 1 {
            let (rows, cols) = (dims[i], dims[i + 1]);
            let std = (2.0 / (rows + cols) as f64).sqrt();
            weights.push(Array2::from_shape_fn((rows, cols), |_| sample_normal(rng, std)));
            biases.push(Array1::zeros(cols));
        }

        Ok(Self { config, embeddings, weights, biases })
    }

    #[must_use]
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }

    /// Mean of non-pad token embeddings, truncated to `max_seq_len`.
    /// An all-pad sequence pools to zero.
    fn pool(&self, tokens: &[u32]) -> Array1<f32> {
        let mut pooled = Array1::<f32>::zeros(self.config.embed_dim);
        let mut count = 0.0;
        for &token in tokens.iter().take(self.config.max_seq_len) {
            if token == 0 {
                continue; // pad
            }
            let idx = (token as usize).min(self.config.vocab_size - 1);
            pooled += &self.embeddings.row(idx);
            count += 1.0;
        }
        if count > 0.0 {
            pooled /= count;
        }
        pooled
    }

    #[must_use]
    pub fn num_parameters(&self) -> usize {
        let embed = self.embeddings.len();
        let dense: usize = self.weights.iter().map(Array2::len).sum();
        let bias: usize = self.biases.iter().map(Array1::len).sum();
        embed + dense + bias
    }
}

impl Critic for Discriminator {
    fn score(&self, sequence: &[u32], condition: &[u32]) -> f32 {
        let seq = self.pool(sequence);
        let cond = self.pool(condition);
        let mut x = Array1::zeros(2 * self.config.embed_dim);
        x.slice_mut(ndarray::s![..self.config.embed_dim]).assign(&seq);
        x.slice_mut(ndarray::s![self.config.embed_dim..]).assign(&cond);

        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            x = x.dot(w) + b;
            if i < self.weights.len() - 1 {
                x.mapv_inplace(|v| if v > 0.0 { v } else { 0.01 * v });
            }
        }
        sigmoid(x[0])
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_config() -> DiscriminatorConfig {
        DiscriminatorConfig {
            vocab_size: 50,
            max_seq_len: 8,
            embed_dim: 8,
            hidden_dims: vec![16],
        }
    }

    #[test]
    fn test_score_in_unit_interval() {
        let disc = Discriminator::with_seed(small_config(), 42).unwrap();
        let prob = disc.score(&[1, 2, 3, 4], &[5, 6, 7]);
        assert!((0.0..=1.0).contains(&prob));
    }

    #[test]
    fn test_score_deterministic() {
        let disc = Discriminator::with_seed(small_config(), 42).unwrap();
        let a = disc.score(&[1, 2, 3], &[4, 5]);
        let b = disc.score(&[1, 2, 3], &[4, 5]);
        assert!((a - b).abs() < 1e-7);
    }

    #[test]
    fn test_condition_changes_score() {
        let disc = Discriminator::with_seed(small_config(), 42).unwrap();
        let a = disc.score(&[1, 2, 3], &[10, 11]);
        let b = disc.score(&[1, 2, 3], &[20, 21]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_sequences_truncated() {
        let disc = Discriminator::with_seed(small_config(), 42).unwrap();
        let long: Vec<u32> = (1..40).collect();
        let truncated: Vec<u32> = (1..=8).collect();
        let a = disc.score(&long, &[1]);
        let b = disc.score(&truncated, &[1]);
        assert!((a - b).abs() < 1e-7);
    }

    #[test]
    fn test_all_pad_sequence_defined() {
        let disc = Discriminator::with_seed(small_config(), 42).unwrap();
        let prob = disc.score(&[0, 0, 0], &[0]);
        assert!(prob.is_finite());
        assert!((0.0..=1.0).contains(&prob));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DiscriminatorConfig { embed_dim: 0, ..small_config() };
        assert!(Discriminator::with_seed(config, 1).is_err());
    }

    #[test]
    fn test_num_parameters_positive() {
        let disc = Discriminator::with_seed(small_config(), 42).unwrap();
        assert!(disc.num_parameters() > 0);
    }

    proptest! {
        #[test]
        fn test_score_bounds(
            seq in prop::collection::vec(0u32..60, 0..12),
            cond in prop::collection::vec(0u32..60, 0..12),
        ) {
            let disc = Discriminator::with_seed(small_config(), 42).unwrap();
            let prob = disc.score(&seq, &cond);
            prop_assert!((0.0..=1.0).contains(&prob));
            prop_assert!(prob.is_finite());
        }
    }
}
