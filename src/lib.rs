//! Abstractive summarization with a pointer-generator model and
//! adversarial fine-tuning
//!
//! The crate covers the model core of a summarization trainer:
//!
//! - **Pointer-generator decoding** (`model`): attention over the source
//!   with coverage, a generate-vs-copy gate, and fusion of the
//!   vocabulary and copy distributions over a per-example extended
//!   vocabulary.
//! - **Beam search** (`decode`): ranked inference-time decoding driven
//!   one step at a time over the same decoder.
//! - **Adversarial fine-tuning** (`gan`): Monte-Carlo rollout rewards
//!   from a conditional discriminator and/or ROUGE-L similarity, feeding
//!   a policy-gradient generator objective.
//!
//! Corpus handling, checkpointing, and data loading stay outside the
//! crate; `vocab` and `batch` only hold the in-memory views the model
//! consumes.
//!
//! # Example
//!
//! ```
//! use resumir::{ModelConfig, PointerGenerator, SourceBatch, Vocabulary};
//!
//! let vocab = Vocabulary::new(["a", "dog", "ran", "fast"].map(String::from));
//! let mut config = ModelConfig::tiny();
//! config.vocab_size = vocab.size();
//! let generator = PointerGenerator::with_seed(config, 42).unwrap();
//!
//! let sources = vec![vec!["a".to_string(), "dog".to_string(), "ran".to_string()]];
//! let src = SourceBatch::from_sources(&vocab, &sources, 10);
//! let (encoded, state) = generator.encode(&src).unwrap();
//! assert_eq!(encoded.batch_size(), 1);
//! assert_eq!(state.batch_size(), 1);
//! ```

pub mod batch;
pub mod decode;
pub mod error;
pub mod eval;
pub mod gan;
pub mod model;
pub mod vocab;

pub use batch::{SourceBatch, TargetBatch};
pub use decode::{BeamConfig, BeamOutcome, BeamResult, BeamSearch, Hypothesis};
pub use error::{ModelError, Result};
pub use eval::rouge_l;
pub use gan::{Critic, Discriminator, DiscriminatorConfig, GanConfig, GanStats, RewardEstimator};
pub use model::{
    DecodeCursor, DecoderState, EncodedSource, ModelConfig, PointerGenerator, SampledBatch,
    StepOutput, SupervisedLoss,
};
pub use vocab::Vocabulary;
