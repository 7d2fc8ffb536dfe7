//! Adversarial fine-tuning
//!
//! SeqGAN-style generator updates: sampled summaries are scored per time
//! step by Monte-Carlo rollouts against a discriminator and/or a
//! similarity metric, and the resulting rewards weight the generator's
//! policy-gradient loss.
//!
//! - `discriminator`: conditional real/fake scorer behind the [`Critic`] seam
//! - `rollout`: the Monte-Carlo reward estimator
//! - `stats`: loss/reward histories and the running-average curve

mod config;
mod discriminator;
mod rollout;
mod stats;

pub use config::{DiscriminatorConfig, GanConfig};
pub use discriminator::Discriminator;
pub use rollout::RewardEstimator;
pub use stats::GanStats;

/// Scores how real a token sequence looks given its conditioning source.
///
/// The rollout estimator only needs this seam, so tests and alternative
/// discriminators plug in freely.
pub trait Critic {
    /// Probability in `[0, 1]` that `sequence` is a real summary of
    /// `condition`.
    fn score(&self, sequence: &[u32], condition: &[u32]) -> f32;
}
