//! Sequence encoder
//!
//! Bidirectional single-layer LSTM over the embedded source. Each
//! position's state is the forward/backward concatenation, padded
//! positions emit zero states, and the final states are reduced by a
//! ReLU linear layer into the decoder's initial state. Downstream code
//! only sees the [`Encode`] seam, so any black box producing
//! `(encoder_states, initial_decoder_state)` can stand in.

use ndarray::{s, Array1, Array2, Array3, Axis};
use rand::Rng;

use super::cell::{DecoderState, LstmCell};
use super::init::{normal_matrix, normal_vector};
use crate::error::{ModelError, Result};

/// Per-position encoder states plus the padding mask they were built with.
#[derive(Debug, Clone)]
pub struct EncodedSource {
    /// `[batch, src_len, 2 * hidden]`
    pub states: Array3<f32>,
    /// `[batch, src_len]`
    pub mask: Array2<f32>,
}

impl EncodedSource {
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.states.dim().0
    }

    #[must_use]
    pub fn src_len(&self) -> usize {
        self.states.dim().1
    }

    #[must_use]
    pub fn state_dim(&self) -> usize {
        self.states.dim().2
    }

    /// Repeat a batch-of-one encoding `n` times. Beam search encodes the
    /// example once and tiles it to the live hypothesis count per step.
    pub fn tile(&self, n: usize) -> Self {
        assert_eq!(self.batch_size(), 1, "tile expects a batch-of-one encoding");
        let (_, src_len, dim) = self.states.dim();
        let mut states = Array3::zeros((n, src_len, dim));
        let mut mask = Array2::zeros((n, src_len));
        for i in 0..n {
            states.slice_mut(s![i, .., ..]).assign(&self.states.slice(s![0, .., ..]));
            mask.row_mut(i).assign(&self.mask.row(0));
        }
        Self { states, mask }
    }
}

/// Encoder seam: embedded source in, per-position states and the initial
/// decoder state out.
pub trait Encode {
    fn encode(&self, emb_inputs: &Array3<f32>, mask: &Array2<f32>) -> Result<(EncodedSource, DecoderState)>;
}

/// Bidirectional LSTM encoder with a ReLU state-reduction layer.
#[derive(Debug)]
pub struct BiLstmEncoder {
    fw: LstmCell,
    bw: LstmCell,
    w_reduce_c: Array2<f32>,
    w_reduce_h: Array2<f32>,
    b_reduce_c: Array1<f32>,
    b_reduce_h: Array1<f32>,
    hidden: usize,
}

impl BiLstmEncoder {
    pub fn new<R: Rng>(emb_dim: usize, hidden: usize, rng: &mut R, std: f64) -> Self {
        Self {
            fw: LstmCell::new(emb_dim, hidden, rng, std),
            bw: LstmCell::new(emb_dim, hidden, rng, std),
            w_reduce_c: normal_matrix(rng, 2 * hidden, hidden, std),
            w_reduce_h: normal_matrix(rng, 2 * hidden, hidden, std),
            b_reduce_c: normal_vector(rng, hidden, std),
            b_reduce_h: normal_vector(rng, hidden, std),
            hidden,
        }
    }

    /// Run one direction, masking state updates so padded positions hold
    /// the previous state and emit zeros.
    fn run_direction(
        &self,
        cell: &LstmCell,
        emb_inputs: &Array3<f32>,
        mask: &Array2<f32>,
        reversed: bool,
    ) -> (Array3<f32>, DecoderState) {
        let (batch, src_len, _) = emb_inputs.dim();
        let mut outputs = Array3::zeros((batch, src_len, self.hidden));
        let mut state = DecoderState::zeros(batch, self.hidden);

        let order: Vec<usize> = if reversed {
            (0..src_len).rev().collect()
        } else {
            (0..src_len).collect()
        };
        for t in order {
            let x = emb_inputs.slice(s![.., t, ..]).to_owned();
            let next = cell.step(&x, &state);
            let m = mask.column(t).insert_axis(Axis(1)).to_owned();
            let inv = m.mapv(|v| 1.0 - v);
            // hold state through pads, emit zero there
            state = DecoderState {
                c: &next.c * &m + &state.c * &inv,
                h: &next.h * &m + &state.h * &inv,
            };
            outputs.slice_mut(s![.., t, ..]).assign(&(&state.h * &m));
        }
        (outputs, state)
    }
}

impl Encode for BiLstmEncoder {
    fn encode(&self, emb_inputs: &Array3<f32>, mask: &Array2<f32>) -> Result<(EncodedSource, DecoderState)> {
        let (batch, src_len, emb_dim) = emb_inputs.dim();
        if emb_dim != self.fw.input_dim() {
            return Err(ModelError::shape("encode", self.fw.input_dim(), emb_dim));
        }
        if mask.dim() != (batch, src_len) {
            return Err(ModelError::shape(
                "encode",
                format!("mask {batch}x{src_len}"),
                format!("mask {}x{}", mask.nrows(), mask.ncols()),
            ));
        }

        let (fw_out, fw_final) = self.run_direction(&self.fw, emb_inputs, mask, false);
        let (bw_out, bw_final) = self.run_direction(&self.bw, emb_inputs, mask, true);

        let mut states = Array3::zeros((batch, src_len, 2 * self.hidden));
        states.slice_mut(s![.., .., ..self.hidden]).assign(&fw_out);
        states.slice_mut(s![.., .., self.hidden..]).assign(&bw_out);

        // bidirectional final states reduced to the decoder's width
        let old_c = ndarray::concatenate(Axis(1), &[fw_final.c.view(), bw_final.c.view()])
            .expect("final state widths agree");
        let old_h = ndarray::concatenate(Axis(1), &[fw_final.h.view(), bw_final.h.view()])
            .expect("final state widths agree");
        let init = DecoderState {
            c: (old_c.dot(&self.w_reduce_c) + &self.b_reduce_c).mapv(relu),
            h: (old_h.dot(&self.w_reduce_h) + &self.b_reduce_h).mapv(relu),
        };

        Ok((EncodedSource { states, mask: mask.clone() }, init))
    }
}

fn relu(x: f32) -> f32 {
    x.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn encoder() -> BiLstmEncoder {
        let mut rng = StdRng::seed_from_u64(11);
        BiLstmEncoder::new(5, 7, &mut rng, 0.1)
    }

    fn inputs(batch: usize, src_len: usize) -> Array3<f32> {
        Array3::from_shape_fn((batch, src_len, 5), |(b, t, d)| {
            ((b + 2 * t + 3 * d) as f32 * 0.37).sin() * 0.5
        })
    }

    #[test]
    fn test_encode_shapes() {
        let enc = encoder();
        let x = inputs(2, 4);
        let mask = Array2::ones((2, 4));
        let (encoded, init) = enc.encode(&x, &mask).unwrap();
        assert_eq!(encoded.states.dim(), (2, 4, 14));
        assert_eq!(init.c.dim(), (2, 7));
        assert!(init.h.iter().all(|v| *v >= 0.0), "reduced state is ReLU-activated");
    }

    #[test]
    fn test_padded_positions_emit_zero_states() {
        let enc = encoder();
        let x = inputs(1, 4);
        let mut mask = Array2::ones((1, 4));
        mask[[0, 2]] = 0.0;
        mask[[0, 3]] = 0.0;
        let (encoded, _) = enc.encode(&x, &mask).unwrap();
        assert!(encoded.states.slice(s![0, 2, ..]).iter().all(|v| *v == 0.0));
        assert!(encoded.states.slice(s![0, 3, ..]).iter().all(|v| *v == 0.0));
        assert!(encoded.states.slice(s![0, 1, ..]).iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_padding_does_not_change_real_states() {
        let enc = encoder();
        // same example with and without trailing pads
        let x_short = inputs(1, 2);
        let mut x_long = Array3::zeros((1, 4, 5));
        x_long.slice_mut(s![.., ..2, ..]).assign(&x_short);
        let (enc_short, init_short) = enc.encode(&x_short, &Array2::ones((1, 2))).unwrap();
        let mut mask = Array2::zeros((1, 4));
        mask[[0, 0]] = 1.0;
        mask[[0, 1]] = 1.0;
        let (enc_long, init_long) = enc.encode(&x_long, &mask).unwrap();

        for t in 0..2 {
            for d in 0..14 {
                let a = enc_short.states[[0, t, d]];
                let b = enc_long.states[[0, t, d]];
                assert!((a - b).abs() < 1e-6);
            }
        }
        for d in 0..7 {
            assert!((init_short.h[[0, d]] - init_long.h[[0, d]]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let enc = encoder();
        let x = Array3::zeros((1, 3, 9));
        assert!(enc.encode(&x, &Array2::ones((1, 3))).is_err());
        let x = inputs(2, 3);
        assert!(enc.encode(&x, &Array2::ones((1, 3))).is_err());
    }

    #[test]
    fn test_tile() {
        let enc = encoder();
        let (encoded, _) = enc.encode(&inputs(1, 3), &Array2::ones((1, 3))).unwrap();
        let tiled = encoded.tile(4);
        assert_eq!(tiled.batch_size(), 4);
        for i in 0..4 {
            assert_eq!(tiled.states.slice(s![i, .., ..]), encoded.states.slice(s![0, .., ..]));
        }
    }
}
