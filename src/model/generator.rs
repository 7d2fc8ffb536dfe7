//! Pointer-generator sequence model
//!
//! Owns the embedding table, encoder, decoder cell, attention, and the
//! projections around them, and drives them in three modes:
//!
//! - supervised: teacher-forced pass over a [`TargetBatch`] producing the
//!   negative log-likelihood and coverage losses,
//! - stochastic sampling: multinomial decoding used for adversarial
//!   fine-tuning and rollout continuations,
//! - one-step decoding: the primitive beam search drives.
//!
//! Every step is a pure `(parameters, state) -> (output, state)` call;
//! the carried state lives in [`DecodeCursor`] and is never shared
//! between hypotheses except by explicit copy.

use ndarray::{s, Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::attention::CopyAttention;
use super::cell::{DecoderState, LstmCell};
use super::config::ModelConfig;
use super::encoder::{BiLstmEncoder, Encode, EncodedSource};
use super::fusion::{coverage_loss, final_distribution, mask_and_avg};
use super::init::{normal_matrix, normal_vector};
use crate::batch::SourceBatch;
use crate::batch::TargetBatch;
use crate::error::{ModelError, Result};
use crate::vocab::Vocabulary;

/// Per-sequence state carried between decode steps: recurrent state,
/// the previous step's context vector, and accumulated coverage.
#[derive(Debug, Clone)]
pub struct DecodeCursor {
    pub state: DecoderState,
    /// `[batch, 2 * hidden]`
    pub context: Array2<f32>,
    /// `[batch, src_len]`
    pub coverage: Array2<f32>,
}

impl DecodeCursor {
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.state.batch_size()
    }

    /// Extract one batch row as a batch-of-one cursor.
    pub fn row(&self, i: usize) -> Self {
        Self {
            state: self.state.row(i),
            context: self.context.row(i).insert_axis(Axis(0)).to_owned(),
            coverage: self.coverage.row(i).insert_axis(Axis(0)).to_owned(),
        }
    }

    /// Stack batch-of-one cursors into one batched cursor.
    pub fn stack(cursors: &[&Self]) -> Self {
        let states: Vec<&DecoderState> = cursors.iter().map(|c| &c.state).collect();
        let mut context = Array2::zeros((cursors.len(), cursors[0].context.ncols()));
        let mut coverage = Array2::zeros((cursors.len(), cursors[0].coverage.ncols()));
        for (i, cur) in cursors.iter().enumerate() {
            context.row_mut(i).assign(&cur.context.row(0));
            coverage.row_mut(i).assign(&cur.coverage.row(0));
        }
        Self { state: DecoderState::stack(&states), context, coverage }
    }
}

/// Output of one decode step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Fused distribution over the extended vocabulary; `[batch, vsize + max_oovs]`
    pub final_dist: Array2<f32>,
    /// Attention distribution for this step; `[batch, src_len]`
    pub attn_dist: Array2<f32>,
    /// Generate-vs-copy gate per batch row, in (0, 1)
    pub p_gen: Array1<f32>,
}

/// Supervised losses for one batch.
#[derive(Debug, Clone, Copy)]
pub struct SupervisedLoss {
    /// Masked average negative log-likelihood of the gold tokens
    pub nll: f32,
    /// Coverage loss (zero when coverage is disabled)
    pub coverage: f32,
    /// `nll + cov_loss_weight * coverage`
    pub total: f32,
}

/// Stochastically sampled sequences with the probability the model
/// assigned each chosen token.
#[derive(Debug, Clone)]
pub struct SampledBatch {
    /// Extended-vocabulary ids; `[batch][max_dec_steps]`
    pub tokens: Vec<Vec<u32>>,
    /// Chosen-token probabilities from the fused distribution
    pub probs: Vec<Vec<f32>>,
}

impl SampledBatch {
    /// Decode padding mask: steps up to and including the first stop
    /// token are valid, everything after is not.
    pub fn valid_mask(&self, stop_id: u32) -> Array2<f32> {
        let steps = self.tokens.first().map_or(0, Vec::len);
        let mut mask = Array2::<f32>::zeros((self.tokens.len(), steps));
        for (b, seq) in self.tokens.iter().enumerate() {
            for (t, &tok) in seq.iter().enumerate() {
                mask[[b, t]] = 1.0;
                if tok == stop_id {
                    break;
                }
            }
        }
        mask
    }
}

/// Sequence-to-sequence model with the copy mechanism and coverage.
pub struct PointerGenerator {
    config: ModelConfig,
    /// `[vocab_size, emb_dim]`
    embeddings: Array2<f32>,
    encoder: BiLstmEncoder,
    cell: LstmCell,
    attention: CopyAttention,
    /// Merges `[emb, context]` back to the cell's input width; `[emb + 2h, emb]`
    w_merge: Array2<f32>,
    b_merge: Array1<f32>,
    /// Gate features `[context, c, h, x]` to one logit; `[2h + h + h + emb]`
    w_pgen: Array1<f32>,
    b_pgen: f32,
    /// Output projection of `[cell_out, context]`; `[h + 2h, h]`
    w_out: Array2<f32>,
    b_out: Array1<f32>,
    /// Vocabulary projection; `[h, vocab_size]`
    w_vocab: Array2<f32>,
    b_vocab: Array1<f32>,
}

impl PointerGenerator {
    /// Create a model with OS-seeded weights.
    pub fn new(config: ModelConfig) -> Result<Self> {
        let mut rng = StdRng::from_os_rng();
        Self::init(config, &mut rng)
    }

    /// Create a model with reproducible weights.
    pub fn with_seed(config: ModelConfig, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::init(config, &mut rng)
    }

    fn init<R: Rng>(config: ModelConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let (v, e, h) = (config.vocab_size, config.emb_dim, config.hidden_dim);
        let std = config.init_std;
        Ok(Self {
            embeddings: normal_matrix(rng, v, e, std),
            encoder: BiLstmEncoder::new(e, h, rng, std),
            cell: LstmCell::new(e, h, rng, std),
            attention: CopyAttention::new(h, config.coverage, rng, std),
            w_merge: normal_matrix(rng, e + 2 * h, e, std),
            b_merge: normal_vector(rng, e, std),
            w_pgen: normal_vector(rng, 2 * h + h + h + e, std),
            b_pgen: 0.0,
            w_out: normal_matrix(rng, h + 2 * h, h, std),
            b_out: normal_vector(rng, h, std),
            w_vocab: normal_matrix(rng, h, v, std),
            b_vocab: normal_vector(rng, v, std),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Embed a matrix of token ids. Ids outside the fixed vocabulary
    /// (extended ids fed back during sampling) embed as `[UNK]`.
    fn embed(&self, ids: &[Vec<u32>]) -> Array3<f32> {
        let steps = ids.first().map_or(0, Vec::len);
        let mut out = Array3::zeros((ids.len(), steps, self.config.emb_dim));
        for (b, row) in ids.iter().enumerate() {
            for (t, &id) in row.iter().enumerate() {
                let id = if (id as usize) < self.config.vocab_size { id } else { 1 };
                out.slice_mut(s![b, t, ..]).assign(&self.embeddings.row(id as usize));
            }
        }
        out
    }

    fn embed_step(&self, ids: &[u32]) -> Array2<f32> {
        let mut out = Array2::zeros((ids.len(), self.config.emb_dim));
        for (b, &id) in ids.iter().enumerate() {
            let id = if (id as usize) < self.config.vocab_size { id } else { 1 };
            out.row_mut(b).assign(&self.embeddings.row(id as usize));
        }
        out
    }

    /// Encode one source batch.
    pub fn encode(&self, batch: &SourceBatch) -> Result<(EncodedSource, DecoderState)> {
        let emb = self.embed(&batch.enc_ids);
        self.encoder.encode(&emb, &batch.mask)
    }

    /// Fresh cursor for teacher-forced training: zero context, zero
    /// coverage, attention starts at the first real step.
    pub fn cursor_fresh(&self, enc: &EncodedSource, init_state: &DecoderState) -> DecodeCursor {
        DecodeCursor {
            state: init_state.clone(),
            context: Array2::zeros((enc.batch_size(), enc.state_dim())),
            coverage: Array2::zeros((enc.batch_size(), enc.src_len())),
        }
    }

    /// Primed cursor for beam search, sampling, and rollouts: attention
    /// runs once against the initial state before any token is emitted,
    /// producing the first context vector and seeding coverage so the
    /// penalty applies from the first real step onward.
    pub fn cursor_primed(&self, enc: &EncodedSource, init_state: &DecoderState) -> DecodeCursor {
        let zero = Array2::zeros((enc.batch_size(), enc.src_len()));
        let att = self.attention.attend(init_state, enc, &zero);
        DecodeCursor {
            state: init_state.clone(),
            context: att.context,
            coverage: att.coverage,
        }
    }

    /// One decode step: embed the inputs, merge with the carried context,
    /// advance the cell, attend, gate, and fuse the distributions.
    pub fn decode_step(
        &self,
        input_ids: &[u32],
        cursor: &DecodeCursor,
        enc: &EncodedSource,
        batch: &SourceBatch,
    ) -> Result<(StepOutput, DecodeCursor)> {
        let n = input_ids.len();
        if n == 0 {
            return Err(ModelError::shape("decode_step", "batch >= 1", "batch = 0"));
        }
        if cursor.batch_size() != n || enc.batch_size() != n {
            return Err(ModelError::shape(
                "decode_step",
                format!("batch {n}"),
                format!("cursor {} / encoder {}", cursor.batch_size(), enc.batch_size()),
            ));
        }
        if batch.extended_ids.len() != n {
            return Err(ModelError::shape(
                "decode_step",
                format!("{n} extended id rows"),
                batch.extended_ids.len(),
            ));
        }
        if enc.state_dim() != 2 * self.config.hidden_dim {
            return Err(ModelError::shape(
                "decode_step",
                2 * self.config.hidden_dim,
                enc.state_dim(),
            ));
        }

        let emb = self.embed_step(input_ids);
        let merge_in = ndarray::concatenate(Axis(1), &[emb.view(), cursor.context.view()])
            .expect("embedding and context batches agree");
        let x = merge_in.dot(&self.w_merge) + &self.b_merge;

        let state = self.cell.step(&x, &cursor.state);
        let att = self.attention.attend(&state, enc, &cursor.coverage);

        // p_gen = sigma(w . [context, c, h, x] + b)
        let gate_in = ndarray::concatenate(
            Axis(1),
            &[att.context.view(), state.c.view(), state.h.view(), x.view()],
        )
        .expect("gate feature batches agree");
        let p_gen = gate_in.dot(&self.w_pgen).mapv(|z| sigmoid(z + self.b_pgen));

        let out_in = ndarray::concatenate(Axis(1), &[state.h.view(), att.context.view()])
            .expect("output feature batches agree");
        let out = out_in.dot(&self.w_out) + &self.b_out;
        let logits = out.dot(&self.w_vocab) + &self.b_vocab;
        let vocab_dist = softmax_rows(&logits);

        let final_dist = final_distribution(
            &p_gen,
            &vocab_dist,
            &att.dist,
            &batch.extended_ids,
            batch.max_oovs,
            self.config.epsilon,
        );

        let next = DecodeCursor { state, context: att.context, coverage: att.coverage.clone() };
        Ok((StepOutput { final_dist, attn_dist: att.dist, p_gen }, next))
    }

    /// Teacher-forced pass computing the supervised objective.
    pub fn supervised_loss(&self, src: &SourceBatch, tgt: &TargetBatch) -> Result<SupervisedLoss> {
        let batch = src.batch_size();
        if tgt.batch_size() != batch {
            return Err(ModelError::shape("supervised_loss", batch, tgt.batch_size()));
        }

        let (enc, init_state) = self.encode(src)?;
        let mut cursor = self.cursor_fresh(&enc, &init_state);
        let steps = tgt.max_dec_steps();

        let mut step_nll = Vec::with_capacity(steps);
        let mut attn_dists = Vec::with_capacity(steps);
        for t in 0..steps {
            let inputs: Vec<u32> = tgt.dec_inputs.iter().map(|row| row[t]).collect();
            let (out, next) = self.decode_step(&inputs, &cursor, &enc, src)?;

            let mut losses = Array1::zeros(batch);
            for b in 0..batch {
                let gold = tgt.targets[b][t] as usize;
                if gold >= out.final_dist.ncols() {
                    return Err(ModelError::UnknownTokenId(tgt.targets[b][t]));
                }
                losses[b] = -out.final_dist[[b, gold]].ln();
            }
            step_nll.push(losses);
            attn_dists.push(out.attn_dist);
            cursor = next;
        }

        let nll = mask_and_avg(&step_nll, &tgt.mask);
        let coverage = if self.config.coverage {
            coverage_loss(&attn_dists, &tgt.mask)
        } else {
            0.0
        };
        Ok(SupervisedLoss {
            nll,
            coverage,
            total: nll + self.config.cov_loss_weight * coverage,
        })
    }

    /// Stochastically decode one batch to `max_dec_steps`, multinomial
    /// over the fused distribution at every step.
    pub fn sample<R: Rng>(&self, src: &SourceBatch, vocab: &Vocabulary, rng: &mut R) -> Result<SampledBatch> {
        let (enc, init_state) = self.encode(src)?;
        self.sample_from(src, &enc, &init_state, vocab, None, 0, rng)
    }

    /// Rollout continuation: replay `given` frozen tokens of each sample,
    /// then sample the rest of the sequence. The encoding is passed in so
    /// repeated rollouts reuse one encoder pass.
    pub fn continue_sample<R: Rng>(
        &self,
        src: &SourceBatch,
        enc: &EncodedSource,
        init_state: &DecoderState,
        vocab: &Vocabulary,
        samples: &[Vec<u32>],
        given: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<u32>>> {
        let out = self.sample_from(src, enc, init_state, vocab, Some(samples), given, rng)?;
        Ok(out.tokens)
    }

    fn sample_from<R: Rng>(
        &self,
        src: &SourceBatch,
        enc: &EncodedSource,
        init_state: &DecoderState,
        vocab: &Vocabulary,
        frozen: Option<&[Vec<u32>]>,
        given: usize,
        rng: &mut R,
    ) -> Result<SampledBatch> {
        let batch = src.batch_size();
        let steps = self.config.max_dec_steps;
        if let Some(frozen) = frozen {
            if frozen.len() != batch {
                return Err(ModelError::shape("continue_sample", batch, frozen.len()));
            }
            if given > steps || frozen.iter().any(|s| s.len() != steps) {
                return Err(ModelError::shape(
                    "continue_sample",
                    format!("{steps} sampled steps"),
                    format!("given {given}"),
                ));
            }
        }

        let mut cursor = self.cursor_primed(enc, init_state);
        let mut inputs = vec![vocab.start_id(); batch];
        let mut tokens = vec![Vec::with_capacity(steps); batch];
        let mut probs = vec![Vec::with_capacity(steps); batch];

        for t in 0..steps {
            let (out, next) = self.decode_step(&inputs, &cursor, enc, src)?;
            for b in 0..batch {
                let row = out.final_dist.row(b);
                let chosen = match frozen {
                    Some(frozen) if t < given => frozen[b][t],
                    _ => multinomial(&row.to_owned(), rng),
                };
                tokens[b].push(chosen);
                probs[b].push(row[chosen as usize]);
            }
            // sampled extended ids re-enter the decoder as [UNK]
            inputs = tokens.iter().map(|seq| seq[t]).collect();
            cursor = next;
        }
        Ok(SampledBatch { tokens, probs })
    }

    /// SeqGAN generator objective: the negative log-probability of every
    /// sampled token weighted by its reward, averaged over valid steps.
    pub fn policy_gradient_loss(
        &self,
        sampled: &SampledBatch,
        rewards: &Array2<f32>,
        mask: &Array2<f32>,
    ) -> Result<f32> {
        let batch = sampled.tokens.len();
        let steps = self.config.max_dec_steps;
        if rewards.dim() != (batch, steps) || mask.dim() != (batch, steps) {
            return Err(ModelError::shape(
                "policy_gradient_loss",
                format!("{batch}x{steps}"),
                format!("rewards {:?} / mask {:?}", rewards.dim(), mask.dim()),
            ));
        }

        let mut step_values = Vec::with_capacity(steps);
        for t in 0..steps {
            let mut v = Array1::zeros(batch);
            for b in 0..batch {
                let p = sampled.probs[b][t].max(self.config.epsilon);
                v[b] = -p.ln() * rewards[[b, t]];
            }
            step_values.push(v);
        }
        Ok(mask_and_avg(&step_values, mask))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = Array2::zeros(logits.raw_dim());
    for (b, row) in logits.axis_iter(Axis(0)).enumerate() {
        let max = row.iter().fold(f32::NEG_INFINITY, |a, &v| a.max(v));
        let mut sum = 0.0;
        for i in 0..row.len() {
            let p = (row[i] - max).exp();
            out[[b, i]] = p;
            sum += p;
        }
        for i in 0..row.len() {
            out[[b, i]] /= sum;
        }
    }
    out
}

/// Draw one index from an unnormalized probability row.
fn multinomial<R: Rng>(row: &Array1<f32>, rng: &mut R) -> u32 {
    let total: f32 = row.sum();
    let mut draw = rng.random::<f32>() * total;
    for (i, &p) in row.iter().enumerate() {
        draw -= p;
        if draw <= 0.0 {
            return i as u32;
        }
    }
    row.len() as u32 - 1
}
