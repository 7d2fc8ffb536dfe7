//! Beam search over the pointer-generator decoder
//!
//! One search session drives the decoder step by step. Every step, each
//! live hypothesis proposes its `2 * beam_size` most probable
//! extensions; the pool keeps the best `beam_size` by cumulative
//! log-probability, with hypotheses that emit the stop token moved to a
//! results pool instead of expanding further. Ties break by insertion
//! order, so a fixed model and source always reproduce the same ranking.

use serde::{Deserialize, Serialize};

use crate::batch::SourceBatch;
use crate::error::{ModelError, Result};
use crate::model::{DecodeCursor, PointerGenerator};
use crate::vocab::Vocabulary;

/// Beam search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamConfig {
    /// Number of live hypotheses
    pub beam_size: usize,
    /// Stop tokens before this many steps discard the candidate instead
    /// of completing it
    pub min_dec_steps: usize,
    /// Hard decode length limit
    pub max_dec_steps: usize,
    /// Rank results by average per-token log-probability instead of the
    /// raw cumulative score
    pub length_normalize: bool,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            beam_size: 4,
            min_dec_steps: 35,
            max_dec_steps: 100,
            length_normalize: true,
        }
    }
}

impl BeamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.beam_size == 0 {
            return Err(ModelError::InvalidConfig("beam_size must be >= 1".to_string()));
        }
        if self.max_dec_steps == 0 {
            return Err(ModelError::InvalidConfig("max_dec_steps must be >= 1".to_string()));
        }
        if self.min_dec_steps >= self.max_dec_steps {
            return Err(ModelError::InvalidConfig(
                "min_dec_steps must be below max_dec_steps".to_string(),
            ));
        }
        Ok(())
    }
}

/// One (possibly finished) decode hypothesis.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    /// Emitted tokens, `[START]` excluded; extended-vocabulary ids
    pub tokens: Vec<u32>,
    /// Per-step log-probabilities of the emitted tokens
    pub log_probs: Vec<f32>,
    /// Attention distribution history, one row per emitted token
    pub attn_history: Vec<Vec<f32>>,
    cursor: DecodeCursor,
}

impl Hypothesis {
    fn initial(cursor: DecodeCursor) -> Self {
        Self {
            tokens: Vec::new(),
            log_probs: Vec::new(),
            attn_history: Vec::new(),
            cursor,
        }
    }

    fn extend(&self, token: u32, log_prob: f32, attn: Vec<f32>, cursor: DecodeCursor) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        let mut log_probs = self.log_probs.clone();
        log_probs.push(log_prob);
        let mut attn_history = self.attn_history.clone();
        attn_history.push(attn);
        Self { tokens, log_probs, attn_history, cursor }
    }

    /// Cumulative log-probability.
    #[must_use]
    pub fn log_prob(&self) -> f32 {
        self.log_probs.iter().sum()
    }

    /// Ranking score: cumulative log-probability, averaged per token
    /// when length normalization is on.
    #[must_use]
    pub fn score(&self, length_normalize: bool) -> f32 {
        if length_normalize && !self.tokens.is_empty() {
            self.log_prob() / self.tokens.len() as f32
        } else {
            self.log_prob()
        }
    }

    fn latest_token(&self, start_id: u32) -> u32 {
        self.tokens.last().copied().unwrap_or(start_id)
    }
}

/// How the search session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamOutcome {
    /// Every returned hypothesis emitted the stop token
    Completed,
    /// The length limit cut the session short
    Truncated,
}

/// Ranked search output.
#[derive(Debug, Clone)]
pub struct BeamResult {
    /// Best-first hypotheses, at most `beam_size`
    pub hypotheses: Vec<Hypothesis>,
    pub outcome: BeamOutcome,
}

/// Beam search decoding session driver.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    config: BeamConfig,
}

impl BeamSearch {
    pub fn new(config: BeamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &BeamConfig {
        &self.config
    }

    /// Decode one example (the batch must hold exactly one source).
    pub fn search(
        &self,
        generator: &PointerGenerator,
        vocab: &Vocabulary,
        src: &SourceBatch,
    ) -> Result<BeamResult> {
        if src.batch_size() != 1 {
            return Err(ModelError::shape("beam search", "batch of one source", src.batch_size()));
        }

        let beam = self.config.beam_size;
        let (enc, init_state) = generator.encode(src)?;
        // initial context from the starting state, so coverage applies
        // from the first emitted token
        let cursor = generator.cursor_primed(&enc, &init_state);

        let mut hyps = vec![Hypothesis::initial(cursor)];
        let mut results: Vec<Hypothesis> = Vec::new();
        let mut steps = 0;
        let mut truncated = false;

        loop {
            if results.len() >= beam || hyps.is_empty() {
                break;
            }
            if steps >= self.config.max_dec_steps {
                truncated = true;
                break;
            }

            // one batched decode step over all live hypotheses
            let inputs: Vec<u32> = hyps.iter().map(|h| h.latest_token(vocab.start_id())).collect();
            let cursors: Vec<&DecodeCursor> = hyps.iter().map(|h| &h.cursor).collect();
            let stacked = DecodeCursor::stack(&cursors);
            let tiled_enc = enc.tile(hyps.len());
            let tiled_src = tile_source(src, hyps.len());
            let (out, next) = generator.decode_step(&inputs, &stacked, &tiled_enc, &tiled_src)?;

            // candidates in hypothesis-then-rank order; the stable sort
            // below makes earliest-formed win on ties
            let mut candidates = Vec::with_capacity(hyps.len() * 2 * beam);
            for (i, hyp) in hyps.iter().enumerate() {
                let row = out.final_dist.row(i);
                let attn: Vec<f32> = out.attn_dist.row(i).to_vec();
                for (token, prob) in top_k(&row.to_vec(), 2 * beam) {
                    candidates.push(hyp.extend(token, prob.ln(), attn.clone(), next.row(i)));
                }
            }
            candidates.sort_by(|a, b| {
                b.log_prob()
                    .partial_cmp(&a.log_prob())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            hyps = Vec::with_capacity(beam);
            for cand in candidates {
                if cand.tokens.last() == Some(&vocab.stop_id()) {
                    // too-short completions are dropped outright
                    if cand.tokens.len() > self.config.min_dec_steps {
                        results.push(cand);
                    }
                } else {
                    hyps.push(cand);
                }
                if hyps.len() >= beam || results.len() >= beam {
                    break;
                }
            }
            steps += 1;
        }

        // nothing completed: fall back to the live beam
        let outcome = if results.is_empty() && truncated {
            results = hyps;
            BeamOutcome::Truncated
        } else if truncated {
            BeamOutcome::Truncated
        } else {
            BeamOutcome::Completed
        };

        results.sort_by(|a, b| {
            b.score(self.config.length_normalize)
                .partial_cmp(&a.score(self.config.length_normalize))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(beam);
        Ok(BeamResult { hypotheses: results, outcome })
    }
}

/// Indices and values of the `k` largest entries, ties resolved toward
/// the lower index.
fn top_k(row: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = row.iter().copied().enumerate().map(|(i, p)| (i as u32, p)).collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}

/// Repeat a batch-of-one source to `n` rows for the batched decode step.
fn tile_source(src: &SourceBatch, n: usize) -> SourceBatch {
    let mut mask = ndarray::Array2::zeros((n, src.src_len()));
    for i in 0..n {
        mask.row_mut(i).assign(&src.mask.row(0));
    }
    SourceBatch {
        enc_ids: vec![src.enc_ids[0].clone(); n],
        extended_ids: vec![src.extended_ids[0].clone(); n],
        mask,
        oovs: vec![src.oovs[0].clone(); n],
        max_oovs: src.max_oovs,
    }
}
