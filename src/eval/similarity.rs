//! ROUGE-L similarity between token sequences
//!
//! Longest-common-subsequence F-score with the standard beta weighting.
//! Operates on token ids, so extended-vocabulary ids compare correctly
//! within one example's decode pass.

const BETA: f32 = 1.2;

/// Length of the longest common subsequence, rolling-row DP.
fn lcs_len(a: &[u32], b: &[u32]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &x in a {
        for (j, &y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L F-score of a candidate against a reference.
///
/// Empty candidate or reference scores zero rather than dividing by
/// zero.
pub fn rouge_l(candidate: &[u32], reference: &[u32]) -> f32 {
    if candidate.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let lcs = lcs_len(candidate, reference) as f32;
    if lcs == 0.0 {
        return 0.0;
    }
    let precision = lcs / candidate.len() as f32;
    let recall = lcs / reference.len() as f32;
    let beta2 = BETA * BETA;
    (1.0 + beta2) * precision * recall / (recall + beta2 * precision)
}

/// The prefix of a sequence before its first stop token.
pub fn truncate_at_stop(tokens: &[u32], stop_id: u32) -> &[u32] {
    match tokens.iter().position(|&t| t == stop_id) {
        Some(i) => &tokens[..i],
        None => tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_identical_sequences_score_one() {
        let seq = vec![4, 5, 6, 7];
        assert_relative_eq!(rouge_l(&seq, &seq), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_disjoint_sequences_score_zero() {
        assert_eq!(rouge_l(&[1, 2, 3], &[4, 5, 6]), 0.0);
    }

    #[test]
    fn test_empty_sequences_defined() {
        assert_eq!(rouge_l(&[], &[1, 2]), 0.0);
        assert_eq!(rouge_l(&[1, 2], &[]), 0.0);
    }

    #[test]
    fn test_subsequence_order_matters() {
        // "a dog ran" vs "ran dog a": LCS is 1 token
        let lcs_forward = lcs_len(&[1, 2, 3], &[1, 2, 3]);
        let lcs_reversed = lcs_len(&[1, 2, 3], &[3, 2, 1]);
        assert_eq!(lcs_forward, 3);
        assert_eq!(lcs_reversed, 1);
    }

    #[test]
    fn test_partial_overlap() {
        // candidate [1,2,9], reference [1,2,3]: lcs = 2,
        // p = 2/3, r = 2/3, f = 2/3 for any beta
        let f = rouge_l(&[1, 2, 9], &[1, 2, 3]);
        assert_relative_eq!(f, 2.0 / 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_truncate_at_stop() {
        assert_eq!(truncate_at_stop(&[5, 6, 3, 7], 3), &[5, 6]);
        assert_eq!(truncate_at_stop(&[5, 6], 3), &[5, 6]);
        assert_eq!(truncate_at_stop(&[3, 5], 3), &[] as &[u32]);
    }

    proptest! {
        #[test]
        fn test_rouge_bounded(
            cand in prop::collection::vec(0u32..10, 0..20),
            reference in prop::collection::vec(0u32..10, 0..20),
        ) {
            let f = rouge_l(&cand, &reference);
            prop_assert!((0.0..=1.0 + 1e-6).contains(&f));
            prop_assert!(f.is_finite());
        }

        #[test]
        fn test_rouge_symmetric_bounds(seq in prop::collection::vec(0u32..10, 1..20)) {
            // self-similarity is maximal
            let own = rouge_l(&seq, &seq);
            prop_assert!((own - 1.0).abs() < 1e-5);
        }
    }
}
