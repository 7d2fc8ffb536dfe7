//! Batched source and target views fed to the encoder and decoder
//!
//! A `SourceBatch` carries both the in-vocabulary id matrix (what the
//! embedding layer sees) and the extended-id matrix (what the copy
//! mechanism scatters into), together with the encoder padding mask and
//! the batch-wide OOV count that fixes the width of the fused
//! distribution.

use ndarray::Array2;

use crate::vocab::Vocabulary;

/// One encoded batch of source examples.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    /// In-vocabulary ids, OOV words replaced by `[UNK]`; `[batch][src_len]`
    pub enc_ids: Vec<Vec<u32>>,
    /// Extended-vocabulary ids; `[batch][src_len]`
    pub extended_ids: Vec<Vec<u32>>,
    /// Encoder padding mask, 1.0 = real token, 0.0 = pad; `[batch, src_len]`
    pub mask: Array2<f32>,
    /// Per-example OOV words in order of first appearance
    pub oovs: Vec<Vec<String>>,
    /// Maximum OOV count over the batch; widens the fused distribution
    pub max_oovs: usize,
}

impl SourceBatch {
    /// Build a batch from tokenized sources, truncating to
    /// `max_enc_steps` and padding to the longest kept sequence.
    pub fn from_sources(vocab: &Vocabulary, sources: &[Vec<String>], max_enc_steps: usize) -> Self {
        let src_len = sources
            .iter()
            .map(|s| s.len().min(max_enc_steps))
            .max()
            .unwrap_or(0);

        let mut enc_ids = Vec::with_capacity(sources.len());
        let mut extended_ids = Vec::with_capacity(sources.len());
        let mut oovs = Vec::with_capacity(sources.len());
        let mut mask = Array2::<f32>::zeros((sources.len(), src_len));

        for (b, source) in sources.iter().enumerate() {
            let kept = &source[..source.len().min(max_enc_steps)];
            let (ext, ex_oovs) = vocab.source_to_extended(kept);

            let mut ids_row = vec![vocab.pad_id(); src_len];
            let mut ext_row = vec![vocab.pad_id(); src_len];
            for (t, (tok, &ext_id)) in kept.iter().zip(ext.iter()).enumerate() {
                // encoder side sees [UNK] for OOV words
                ids_row[t] = vocab.word_to_id(tok);
                ext_row[t] = ext_id;
                mask[[b, t]] = 1.0;
            }
            enc_ids.push(ids_row);
            extended_ids.push(ext_row);
            oovs.push(ex_oovs);
        }

        let max_oovs = oovs.iter().map(Vec::len).max().unwrap_or(0);
        Self { enc_ids, extended_ids, mask, oovs, max_oovs }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.enc_ids.len()
    }

    #[must_use]
    pub fn src_len(&self) -> usize {
        self.mask.ncols()
    }
}

/// Decoder-side supervision for one batch.
#[derive(Debug, Clone)]
pub struct TargetBatch {
    /// Decoder inputs: `[START]` then the reference shifted right, OOV
    /// words as `[UNK]`; `[batch][max_dec_steps]`
    pub dec_inputs: Vec<Vec<u32>>,
    /// Gold targets in extended ids, reference then `[STOP]`;
    /// `[batch][max_dec_steps]`
    pub targets: Vec<Vec<u32>>,
    /// Decode padding mask; `[batch, max_dec_steps]`
    pub mask: Array2<f32>,
}

impl TargetBatch {
    /// Build decoder inputs and targets from tokenized references. The
    /// per-example OOV lists must come from the matching `SourceBatch`.
    pub fn from_references(
        vocab: &Vocabulary,
        references: &[Vec<String>],
        oovs: &[Vec<String>],
        max_dec_steps: usize,
    ) -> Self {
        let mut dec_inputs = Vec::with_capacity(references.len());
        let mut targets = Vec::with_capacity(references.len());
        let mut mask = Array2::<f32>::zeros((references.len(), max_dec_steps));

        for (b, reference) in references.iter().enumerate() {
            let in_vocab: Vec<u32> = reference.iter().map(|tok| vocab.word_to_id(tok)).collect();
            let extended = vocab.target_to_extended(reference, &oovs[b]);

            // input = [START] w1 w2 ...; target = w1 w2 ... [STOP]
            let mut input_row = vec![vocab.pad_id(); max_dec_steps];
            let mut target_row = vec![vocab.pad_id(); max_dec_steps];
            input_row[0] = vocab.start_id();
            let steps = (reference.len() + 1).min(max_dec_steps);
            for t in 0..steps {
                if t + 1 < max_dec_steps {
                    input_row[t + 1] = in_vocab.get(t).copied().unwrap_or(vocab.pad_id());
                }
                target_row[t] = extended.get(t).copied().unwrap_or(vocab.stop_id());
                mask[[b, t]] = 1.0;
            }
            dec_inputs.push(input_row);
            targets.push(target_row);
        }

        Self { dec_inputs, targets, mask }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.dec_inputs.len()
    }

    #[must_use]
    pub fn max_dec_steps(&self) -> usize {
        self.mask.ncols()
    }
}
