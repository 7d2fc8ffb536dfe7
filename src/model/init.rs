//! Weight initialization helpers

use ndarray::{Array1, Array2};
use rand::Rng;

/// Box-Muller normal sample with the given standard deviation.
pub(crate) fn sample_normal<R: Rng>(rng: &mut R, std: f64) -> f32 {
    let u1: f64 = rng.random::<f64>().max(1e-10);
    let u2: f64 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    (z * std) as f32
}

pub(crate) fn normal_matrix<R: Rng>(rng: &mut R, rows: usize, cols: usize, std: f64) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| sample_normal(rng, std))
}

pub(crate) fn normal_vector<R: Rng>(rng: &mut R, len: usize, std: f64) -> Array1<f32> {
    Array1::from_shape_fn(len, |_| sample_normal(rng, std))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_normal_matrix_shape_and_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let w = normal_matrix(&mut rng, 40, 50, 0.1);
        assert_eq!(w.dim(), (40, 50));
        assert!(w.iter().all(|v| v.is_finite()));

        // sample standard deviation should be in the right ballpark
        let n = w.len() as f32;
        let mean = w.sum() / n;
        let var = w.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        assert!(var.sqrt() > 0.05 && var.sqrt() < 0.2);
    }

    #[test]
    fn test_seeded_init_deterministic() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        assert_eq!(normal_vector(&mut a, 16, 0.5), normal_vector(&mut b, 16, 0.5));
    }
}
