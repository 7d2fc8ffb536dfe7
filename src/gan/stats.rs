//! Adversarial training statistics
//!
//! Bounded histories of generator losses and mean rewards plus an
//! exponentially decayed running average used for early stopping on a
//! smoother curve than the raw losses.

use std::collections::VecDeque;

const HISTORY: usize = 100;
/// Upper clip on the running-average loss curve
const RUNNING_AVG_CLIP: f32 = 12.0;

/// Statistics from adversarial fine-tuning.
#[derive(Debug, Clone)]
pub struct GanStats {
    /// Completed generator update steps
    pub steps: usize,
    /// Recent generator losses
    pub gen_losses: VecDeque<f32>,
    /// Recent mean rewards
    pub mean_rewards: VecDeque<f32>,
    /// Exponential-decay running average of the generator loss
    pub running_avg_loss: f32,
    decay: f32,
}

impl Default for GanStats {
    fn default() -> Self {
        Self {
            steps: 0,
            gen_losses: VecDeque::with_capacity(HISTORY),
            mean_rewards: VecDeque::with_capacity(HISTORY),
            running_avg_loss: 0.0,
            decay: 0.9,
        }
    }
}

impl GanStats {
    /// Record one generator update.
    pub fn record_step(&mut self, gen_loss: f32, mean_reward: f32) {
        self.steps += 1;

        if self.gen_losses.len() >= HISTORY {
            self.gen_losses.pop_front();
        }
        self.gen_losses.push_back(gen_loss);

        if self.mean_rewards.len() >= HISTORY {
            self.mean_rewards.pop_front();
        }
        self.mean_rewards.push_back(mean_reward);

        // first step seeds the average, later steps decay toward it
        self.running_avg_loss = if self.steps == 1 {
            gen_loss
        } else {
            self.running_avg_loss * self.decay + (1.0 - self.decay) * gen_loss
        };
        self.running_avg_loss = self.running_avg_loss.min(RUNNING_AVG_CLIP);
    }

    /// Average generator loss over recent history.
    #[must_use]
    pub fn avg_gen_loss(&self) -> f32 {
        if self.gen_losses.is_empty() {
            return 0.0;
        }
        self.gen_losses.iter().sum::<f32>() / self.gen_losses.len() as f32
    }

    /// Average reward over recent history.
    #[must_use]
    pub fn avg_reward(&self) -> f32 {
        if self.mean_rewards.is_empty() {
            return 0.0;
        }
        self.mean_rewards.iter().sum::<f32>() / self.mean_rewards.len() as f32
    }

    /// Print a progress line for the current step.
    pub fn log_progress(&self) {
        println!(
            "Step {}: loss={:.4} (running avg {:.4}), reward={:.4}",
            self.steps,
            self.gen_losses.back().copied().unwrap_or(0.0),
            self.running_avg_loss,
            self.mean_rewards.back().copied().unwrap_or(0.0),
        );
    }
}
