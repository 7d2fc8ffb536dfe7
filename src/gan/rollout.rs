//! Monte-Carlo rollout reward estimation
//!
//! For each truncation point of each sampled sequence, the estimator
//! freezes the prefix, stochastically completes it `N` times with the
//! generator's own sampling, scores the completions with the critic
//! and/or ROUGE-L against the reference, and averages. Similarity
//! scores are cumulative by nature, so they are differenced across
//! truncation points before blending: each token is credited only with
//! the additional similarity it contributes.
//!
//! One reward computation costs `O(N * (max_dec_steps - rollout_start))`
//! batched decode passes; each pass covers the whole batch at once.

use ndarray::Array2;
use rand::Rng;

use super::config::GanConfig;
use super::Critic;
use crate::batch::SourceBatch;
use crate::error::{ModelError, Result};
use crate::eval::{rouge_l, truncate_at_stop};
use crate::model::{PointerGenerator, SampledBatch};
use crate::vocab::Vocabulary;

/// Per-time-step reward estimator for policy-gradient fine-tuning.
#[derive(Debug, Clone)]
pub struct RewardEstimator {
    config: GanConfig,
}

impl RewardEstimator {
    pub fn new(config: GanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &GanConfig {
        &self.config
    }

    /// Estimate `[batch, max_dec_steps]` rewards for one sampled batch.
    ///
    /// `references` are the gold summaries in extended ids; the critic
    /// is conditioned on the source's extended ids. The generator's
    /// parameters are only read, never updated, for the whole pass.
    pub fn rewards<C: Critic, R: Rng>(
        &self,
        generator: &PointerGenerator,
        vocab: &Vocabulary,
        src: &SourceBatch,
        sampled: &SampledBatch,
        references: &[Vec<u32>],
        critic: &C,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let batch = src.batch_size();
        let steps = generator.config().max_dec_steps;
        let r = self.config.similarity_ratio;
        let n = self.config.rollout_num;

        if sampled.tokens.len() != batch || references.len() != batch {
            return Err(ModelError::shape(
                "rollout rewards",
                format!("{batch} samples and references"),
                format!("{} / {}", sampled.tokens.len(), references.len()),
            ));
        }
        if sampled.tokens.iter().any(|s| s.len() != steps) {
            return Err(ModelError::shape(
                "rollout rewards",
                format!("samples of {steps} steps"),
                "ragged sample lengths",
            ));
        }
        if self.config.rollout_start >= steps {
            return Err(ModelError::InvalidConfig(format!(
                "rollout_start {} must be below max_dec_steps {steps}",
                self.config.rollout_start
            )));
        }

        // one encoder pass shared by every rollout
        let (enc, init_state) = generator.encode(src)?;
        let stop = vocab.stop_id();

        let mut critic_rewards = Array2::<f32>::zeros((batch, steps));
        // cumulative similarity per truncation point; column `given`
        // holds the score with `given` tokens frozen
        let mut sim_cum = Array2::<f32>::zeros((batch, steps + 1));

        for given in self.config.rollout_start..steps {
            for _ in 0..n {
                let rollouts = generator.continue_sample(
                    src,
                    &enc,
                    &init_state,
                    vocab,
                    &sampled.tokens,
                    given,
                    rng,
                )?;
                for b in 0..batch {
                    if r < 1.0 {
                        critic_rewards[[b, given - 1]] +=
                            critic.score(&rollouts[b], &src.extended_ids[b]);
                    }
                    if r > 0.0 {
                        sim_cum[[b, given]] += rouge_l(
                            truncate_at_stop(&rollouts[b], stop),
                            truncate_at_stop(&references[b], stop),
                        );
                    }
                }
            }
            for b in 0..batch {
                critic_rewards[[b, given - 1]] /= n as f32;
                sim_cum[[b, given]] /= n as f32;
            }
        }

        // final step: the sample itself is complete, score it directly
        for b in 0..batch {
            if r < 1.0 {
                critic_rewards[[b, steps - 1]] =
                    critic.score(&sampled.tokens[b], &src.extended_ids[b]);
            }
            if r > 0.0 {
                sim_cum[[b, steps]] = rouge_l(
                    truncate_at_stop(&sampled.tokens[b], stop),
                    truncate_at_stop(&references[b], stop),
                );
            }
        }

        let mut rewards = Array2::<f32>::zeros((batch, steps));
        for b in 0..batch {
            for t in 0..steps {
                let sim_step = sim_cum[[b, t + 1]] - sim_cum[[b, t]];
                rewards[[b, t]] = (1.0 - r) * critic_rewards[[b, t]] + r * sim_step;
            }
            // before the rollout start there is nothing to credit
            for t in 0..self.config.rollout_start.saturating_sub(1) {
                rewards[[b, t]] = 0.0;
            }
        }
        Ok(rewards)
    }
}
