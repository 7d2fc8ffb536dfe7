//! Sequence evaluation metrics

mod similarity;

pub use similarity::{rouge_l, truncate_at_stop};
