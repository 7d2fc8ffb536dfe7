//! Attention with coverage for the copy mechanism
//!
//! One step of attention scores every source position by
//! `vᵀ tanh(W_h h_i + W_s s_t + w_c c_i + b)`, masks and renormalizes
//! over real tokens, and returns the context vector together with the
//! accumulated coverage. Coverage is the running sum of attention mass
//! per position; the `w_c` bias term discourages re-attending positions
//! that already received mass.

use ndarray::{s, Array1, Array2, Axis};
use rand::Rng;

use super::cell::DecoderState;
use super::encoder::EncodedSource;
use super::init::{normal_matrix, normal_vector};

/// Output of one attention step.
#[derive(Debug, Clone)]
pub struct Attention {
    /// Weighted sum of encoder states; `[batch, 2 * hidden]`
    pub context: Array2<f32>,
    /// Masked, renormalized attention distribution; `[batch, src_len]`
    pub dist: Array2<f32>,
    /// Coverage after this step; `[batch, src_len]`
    pub coverage: Array2<f32>,
}

/// Learned attention scorer shared across all decode steps.
#[derive(Debug)]
pub struct CopyAttention {
    /// Encoder feature projection; `[2 * hidden, attn]`
    w_h: Array2<f32>,
    /// Decoder feature projection from `[c, h]`; `[2 * hidden, attn]`
    w_s: Array2<f32>,
    /// Coverage feature weights; `[attn]`
    w_c: Array1<f32>,
    v: Array1<f32>,
    b: Array1<f32>,
    use_coverage: bool,
}

impl CopyAttention {
    pub fn new<R: Rng>(hidden: usize, use_coverage: bool, rng: &mut R, std: f64) -> Self {
        // attention vector size matches the encoder state width
        let attn = 2 * hidden;
        Self {
            w_h: normal_matrix(rng, 2 * hidden, attn, std),
            w_s: normal_matrix(rng, 2 * hidden, attn, std),
            w_c: normal_vector(rng, attn, std),
            v: normal_vector(rng, attn, std),
            b: normal_vector(rng, attn, std),
            use_coverage,
        }
    }

    #[must_use]
    pub fn uses_coverage(&self) -> bool {
        self.use_coverage
    }

    /// One attention step against the full encoder state matrix.
    ///
    /// `coverage` is the accumulated mass *before* this step; the
    /// returned coverage includes this step's distribution. With
    /// coverage disabled the input is returned unchanged.
    pub fn attend(&self, state: &DecoderState, enc: &EncodedSource, coverage: &Array2<f32>) -> Attention {
        let (batch, src_len, state_dim) = enc.states.dim();
        assert_eq!(state.batch_size(), batch, "decoder state batch must match encoder");
        assert_eq!(coverage.dim(), (batch, src_len), "coverage must match source layout");
        assert_eq!(state_dim, self.w_h.nrows(), "encoder state width must match attention");

        // decoder features: W_s [c, h]
        let dec_in = ndarray::concatenate(Axis(1), &[state.c.view(), state.h.view()])
            .expect("state halves have equal batch");
        let dec_features = dec_in.dot(&self.w_s);

        let attn = self.v.len();
        let mut scores = Array2::<f32>::zeros((batch, src_len));
        for b in 0..batch {
            // encoder features for this row: [src_len, attn]
            let enc_features = enc.states.slice(s![b, .., ..]).dot(&self.w_h);
            for i in 0..src_len {
                let mut e = 0.0;
                for a in 0..attn {
                    let mut pre = enc_features[[i, a]] + dec_features[[b, a]] + self.b[a];
                    if self.use_coverage {
                        pre += self.w_c[a] * coverage[[b, i]];
                    }
                    e += self.v[a] * pre.tanh();
                }
                scores[[b, i]] = e;
            }
        }

        let dist = masked_softmax(&scores, &enc.mask);

        // context = sum_i dist[b, i] * states[b, i, :]
        let mut context = Array2::<f32>::zeros((batch, state_dim));
        for b in 0..batch {
            for i in 0..src_len {
                let w = dist[[b, i]];
                if w == 0.0 {
                    continue;
                }
                let row = enc.states.slice(s![b, i, ..]);
                context.row_mut(b).scaled_add(w, &row);
            }
        }

        let coverage = if self.use_coverage {
            coverage + &dist
        } else {
            coverage.clone()
        };

        Attention { context, dist, coverage }
    }
}

/// Softmax over source positions with the padding mask applied and the
/// result renormalized. A row whose mask is entirely zero yields the
/// defined all-zero distribution instead of dividing by zero.
pub fn masked_softmax(scores: &Array2<f32>, mask: &Array2<f32>) -> Array2<f32> {
    assert_eq!(scores.dim(), mask.dim(), "scores and mask must agree");
    let mut out = Array2::<f32>::zeros(scores.raw_dim());
    for (b, row) in scores.axis_iter(Axis(0)).enumerate() {
        let max = row
            .iter()
            .zip(mask.row(b))
            .filter(|(_, &m)| m > 0.0)
            .map(|(&e, _)| e)
            .fold(f32::NEG_INFINITY, f32::max);
        if max == f32::NEG_INFINITY {
            continue; // all padded
        }
        let mut sum = 0.0;
        for i in 0..row.len() {
            let p = if mask[[b, i]] > 0.0 { (row[i] - max).exp() } else { 0.0 };
            out[[b, i]] = p;
            sum += p;
        }
        for i in 0..row.len() {
            out[[b, i]] /= sum;
        }
    }
    out
}
