//! Inference-time decoding

mod beam;

pub use beam::{BeamConfig, BeamOutcome, BeamResult, BeamSearch, Hypothesis};
