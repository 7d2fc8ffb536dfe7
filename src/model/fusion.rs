//! Fusing the vocabulary and copy distributions
//!
//! The pointer mechanism: scale the vocabulary distribution by `p_gen`
//! and the attention distribution by `1 - p_gen`, widen the vocabulary
//! distribution with zero slots for this batch's OOV words, then
//! scatter-add the attention mass into the slots named by each source
//! position's extended id. Positions holding the same word accumulate,
//! which is how repeated source words reinforce each other. Every entry
//! is floored by epsilon so downstream logs stay finite.

use ndarray::{Array1, Array2};

/// Merge vocabulary and attention distributions into one distribution
/// over the extended vocabulary.
///
/// Result width is `vocab_dist.ncols() + max_oovs` and each row sums to
/// `1 + epsilon * width` (≈1 up to the documented bounded constant).
pub fn final_distribution(
    p_gen: &Array1<f32>,
    vocab_dist: &Array2<f32>,
    attn_dist: &Array2<f32>,
    extended_ids: &[Vec<u32>],
    max_oovs: usize,
    epsilon: f32,
) -> Array2<f32> {
    let (batch, vsize) = vocab_dist.dim();
    assert_eq!(p_gen.len(), batch, "p_gen must be one gate per batch row");
    assert_eq!(attn_dist.nrows(), batch, "attention batch must match vocab batch");
    assert_eq!(extended_ids.len(), batch, "extended ids must cover the batch");

    let extended = vsize + max_oovs;
    let mut out = Array2::<f32>::from_elem((batch, extended), epsilon);
    for b in 0..batch {
        let gate = p_gen[b];
        for v in 0..vsize {
            out[[b, v]] += gate * vocab_dist[[b, v]];
        }
        let ids = &extended_ids[b];
        assert_eq!(ids.len(), attn_dist.ncols(), "extended ids must cover every source position");
        for (i, &id) in ids.iter().enumerate() {
            let id = id as usize;
            assert!(id < extended, "extended id {id} exceeds distribution width {extended}");
            out[[b, id]] += (1.0 - gate) * attn_dist[[b, i]];
        }
    }
    out
}

/// Mask per-step values and average: each example's masked sum is
/// normalized by its decode length, then averaged over the batch.
pub fn mask_and_avg(values: &[Array1<f32>], mask: &Array2<f32>) -> f32 {
    let (batch, steps) = mask.dim();
    assert_eq!(values.len(), steps, "one value vector per decode step");

    let mut total = 0.0;
    for b in 0..batch {
        let dec_len: f32 = mask.row(b).sum();
        if dec_len == 0.0 {
            continue;
        }
        let mut acc = 0.0;
        for (t, v) in values.iter().enumerate() {
            acc += v[b] * mask[[b, t]];
        }
        total += acc / dec_len;
    }
    total / batch as f32
}

/// Coverage loss over one decoded sequence of attention distributions.
///
/// Coverage starts at zero; each step contributes
/// `sum_i min(a_t[i], c_t[i])` before the step's mass is folded in, so a
/// sequence whose attention supports are disjoint across steps costs
/// exactly zero.
pub fn coverage_loss(attn_dists: &[Array2<f32>], mask: &Array2<f32>) -> f32 {
    if attn_dists.is_empty() {
        return 0.0;
    }
    let (batch, _src_len) = attn_dists[0].dim();
    assert_eq!(mask.nrows(), batch, "mask batch must match attention batch");

    let mut coverage = Array2::<f32>::zeros(attn_dists[0].raw_dim());
    let mut step_losses = Vec::with_capacity(attn_dists.len());
    for dist in attn_dists {
        let mut loss = Array1::<f32>::zeros(batch);
        for b in 0..batch {
            let mut acc = 0.0;
            for i in 0..dist.ncols() {
                acc += dist[[b, i]].min(coverage[[b, i]]);
            }
            loss[b] = acc;
        }
        step_losses.push(loss);
        coverage += dist;
    }
    mask_and_avg(&step_losses, mask)
}
