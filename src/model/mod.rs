//! Pointer-generator sequence model
//!
//! - `encoder`: bidirectional LSTM over the source behind the [`Encode`] seam
//! - `cell`: decoder LSTM cell and the carried [`DecoderState`]
//! - `attention`: masked attention with coverage for the copy mechanism
//! - `fusion`: merging vocabulary and copy distributions, coverage loss
//! - `generator`: the model driver (supervised loss, sampling, one-step decode)

mod attention;
mod cell;
mod config;
mod encoder;
mod fusion;
mod generator;
mod init;

pub use attention::{masked_softmax, Attention, CopyAttention};
pub use cell::{DecoderState, LstmCell};
pub use config::ModelConfig;
pub use encoder::{BiLstmEncoder, Encode, EncodedSource};
pub use fusion::{coverage_loss, final_distribution, mask_and_avg};
pub use generator::{
    DecodeCursor, PointerGenerator, SampledBatch, StepOutput, SupervisedLoss,
};
