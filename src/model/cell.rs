//! LSTM cell and the decoder state carried between decode steps

use ndarray::{Array1, Array2, Axis};
use rand::Rng;

use super::init::normal_matrix;

/// Hidden/cell state pair carried between decode steps.
///
/// Owned by the decoding loop for the duration of one sequence; beam
/// hypotheses get their own copy via [`DecoderState::row`] /
/// [`DecoderState::stack`].
#[derive(Debug, Clone)]
pub struct DecoderState {
    /// Cell state; `[batch, hidden]`
    pub c: Array2<f32>,
    /// Hidden state; `[batch, hidden]`
    pub h: Array2<f32>,
}

impl DecoderState {
    pub fn zeros(batch: usize, hidden: usize) -> Self {
        Self {
            c: Array2::zeros((batch, hidden)),
            h: Array2::zeros((batch, hidden)),
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.c.nrows()
    }

    #[must_use]
    pub fn hidden_dim(&self) -> usize {
        self.c.ncols()
    }

    /// Extract one batch row as a batch-of-one state.
    pub fn row(&self, i: usize) -> Self {
        Self {
            c: self.c.row(i).insert_axis(Axis(0)).to_owned(),
            h: self.h.row(i).insert_axis(Axis(0)).to_owned(),
        }
    }

    /// Stack batch-of-one states into one batched state. Used to run all
    /// beam hypotheses through a single decode step.
    pub fn stack(states: &[&Self]) -> Self {
        let hidden = states[0].hidden_dim();
        let mut c = Array2::zeros((states.len(), hidden));
        let mut h = Array2::zeros((states.len(), hidden));
        for (i, st) in states.iter().enumerate() {
            assert_eq!(st.batch_size(), 1, "stack expects batch-of-one states");
            c.row_mut(i).assign(&st.c.row(0));
            h.row_mut(i).assign(&st.h.row(0));
        }
        Self { c, h }
    }
}

/// Single LSTM cell with a combined gate weight matrix.
///
/// Gate order in the packed matrix is input, forget, candidate, output.
/// The forget gate carries the usual +1 bias at init time.
#[derive(Debug)]
pub struct LstmCell {
    /// `[input_dim + hidden, 4 * hidden]`
    w: Array2<f32>,
    /// `[4 * hidden]`
    b: Array1<f32>,
    hidden: usize,
}

impl LstmCell {
    pub fn new<R: Rng>(input_dim: usize, hidden: usize, rng: &mut R, std: f64) -> Self {
        let w = normal_matrix(rng, input_dim + hidden, 4 * hidden, std);
        let mut b = Array1::zeros(4 * hidden);
        for f in hidden..2 * hidden {
            b[f] = 1.0;
        }
        Self { w, b, hidden }
    }

    #[must_use]
    pub fn hidden_dim(&self) -> usize {
        self.hidden
    }

    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.w.nrows() - self.hidden
    }

    /// One recurrence step: `(x, state) -> state'`.
    pub fn step(&self, x: &Array2<f32>, state: &DecoderState) -> DecoderState {
        assert_eq!(
            x.ncols(),
            self.input_dim(),
            "cell input width must match the cell"
        );
        assert_eq!(x.nrows(), state.batch_size(), "cell input batch must match state");

        let zx = x.dot(&self.w.slice(ndarray::s![..self.input_dim(), ..]));
        let zh = state.h.dot(&self.w.slice(ndarray::s![self.input_dim().., ..]));
        let z = zx + zh + &self.b;

        let h = self.hidden;
        let i = z.slice(ndarray::s![.., ..h]).mapv(sigmoid);
        let f = z.slice(ndarray::s![.., h..2 * h]).mapv(sigmoid);
        let g = z.slice(ndarray::s![.., 2 * h..3 * h]).mapv(f32::tanh);
        let o = z.slice(ndarray::s![.., 3 * h..]).mapv(sigmoid);

        let c = &f * &state.c + &i * &g;
        let h_out = &o * &c.mapv(f32::tanh);
        DecoderState { c, h: h_out }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cell() -> LstmCell {
        let mut rng = StdRng::seed_from_u64(42);
        LstmCell::new(6, 4, &mut rng, 0.1)
    }

    #[test]
    fn test_step_shapes() {
        let cell = cell();
        let state = DecoderState::zeros(3, 4);
        let x = Array2::from_elem((3, 6), 0.5);
        let next = cell.step(&x, &state);
        assert_eq!(next.c.dim(), (3, 4));
        assert_eq!(next.h.dim(), (3, 4));
        assert!(next.h.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_step_deterministic() {
        let cell = cell();
        let state = DecoderState::zeros(2, 4);
        let x = Array2::from_elem((2, 6), 0.3);
        let a = cell.step(&x, &state);
        let b = cell.step(&x, &state);
        assert_eq!(a.h, b.h);
        assert_eq!(a.c, b.c);
    }

    #[test]
    fn test_state_depends_on_input() {
        let cell = cell();
        let state = DecoderState::zeros(1, 4);
        let a = cell.step(&Array2::from_elem((1, 6), 0.9), &state);
        let b = cell.step(&Array2::from_elem((1, 6), -0.9), &state);
        assert_ne!(a.h, b.h);
    }

    #[test]
    fn test_row_stack_roundtrip() {
        let cell = cell();
        let state = cell.step(&Array2::from_elem((3, 6), 0.2), &DecoderState::zeros(3, 4));
        let rows: Vec<DecoderState> = (0..3).map(|i| state.row(i)).collect();
        let refs: Vec<&DecoderState> = rows.iter().collect();
        let stacked = DecoderState::stack(&refs);
        assert_eq!(stacked.c, state.c);
        assert_eq!(stacked.h, state.h);
    }

    #[test]
    #[should_panic(expected = "cell input width")]
    fn test_wrong_input_width_panics() {
        let cell = cell();
        cell.step(&Array2::zeros((1, 3)), &DecoderState::zeros(1, 4));
    }
}
