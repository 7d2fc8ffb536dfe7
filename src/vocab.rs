//! Token vocabulary with per-example extended ids for copied source words
//!
//! The fixed vocabulary maps words to dense ids with four reserved tokens
//! at the front. On top of it, each source example gets an *extended*
//! vocabulary: out-of-vocabulary source words are assigned ids
//! `size() + k` in order of first appearance. Extended ids are only
//! meaningful within that example's decode pass.

use std::collections::HashMap;

use crate::error::{ModelError, Result};

/// Padding token, id 0
pub const PAD_TOKEN: &str = "[PAD]";
/// Unknown-word token, id 1
pub const UNKNOWN_TOKEN: &str = "[UNK]";
/// Sequence-start token fed as the first decoder input, id 2
pub const START_DECODING: &str = "[START]";
/// Sequence-stop token that terminates decoding, id 3
pub const STOP_DECODING: &str = "[STOP]";

const RESERVED: [&str; 4] = [PAD_TOKEN, UNKNOWN_TOKEN, START_DECODING, STOP_DECODING];

/// Bidirectional word/id mapping with a fixed in-vocabulary size.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    word_to_id: HashMap<String, u32>,
    id_to_word: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from a word list. Reserved tokens are inserted
    /// first; duplicates and reserved names in the input are skipped.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut word_to_id = HashMap::new();
        let mut id_to_word = Vec::new();
        for w in RESERVED {
            word_to_id.insert(w.to_string(), id_to_word.len() as u32);
            id_to_word.push(w.to_string());
        }
        for w in words {
            let w = w.into();
            if word_to_id.contains_key(&w) {
                continue;
            }
            word_to_id.insert(w.clone(), id_to_word.len() as u32);
            id_to_word.push(w);
        }
        Self { word_to_id, id_to_word }
    }

    /// Number of in-vocabulary ids, reserved tokens included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.id_to_word.len()
    }

    /// Map a word to its id, falling back to `[UNK]`.
    pub fn word_to_id(&self, word: &str) -> u32 {
        self.word_to_id
            .get(word)
            .copied()
            .unwrap_or_else(|| self.unknown_id())
    }

    /// Map an in-vocabulary id back to its word.
    pub fn id_to_word(&self, id: u32) -> Result<&str> {
        self.id_to_word
            .get(id as usize)
            .map(String::as_str)
            .ok_or(ModelError::UnknownTokenId(id))
    }

    pub fn pad_id(&self) -> u32 {
        0
    }

    pub fn unknown_id(&self) -> u32 {
        1
    }

    pub fn start_id(&self) -> u32 {
        2
    }

    pub fn stop_id(&self) -> u32 {
        3
    }

    /// Map source tokens to extended-vocabulary ids.
    ///
    /// Returns the id sequence (OOV words get `size() + k`) and the OOV
    /// words in order of first appearance. Repeated OOV words reuse the
    /// same extended id, which is what lets repeated source words
    /// reinforce each other in the copy distribution.
    pub fn source_to_extended(&self, tokens: &[String]) -> (Vec<u32>, Vec<String>) {
        let mut ids = Vec::with_capacity(tokens.len());
        let mut oovs: Vec<String> = Vec::new();
        for tok in tokens {
            match self.word_to_id.get(tok) {
                Some(&id) => ids.push(id),
                None => {
                    let k = match oovs.iter().position(|o| o == tok) {
                        Some(k) => k,
                        None => {
                            oovs.push(tok.clone());
                            oovs.len() - 1
                        }
                    };
                    ids.push((self.size() + k) as u32);
                }
            }
        }
        (ids, oovs)
    }

    /// Map reference tokens to extended ids: an OOV word present in the
    /// example's source resolves to its extended id, anything else to
    /// `[UNK]`.
    pub fn target_to_extended(&self, tokens: &[String], oovs: &[String]) -> Vec<u32> {
        tokens
            .iter()
            .map(|tok| match self.word_to_id.get(tok) {
                Some(&id) => id,
                None => match oovs.iter().position(|o| o == tok) {
                    Some(k) => (self.size() + k) as u32,
                    None => self.unknown_id(),
                },
            })
            .collect()
    }

    /// Map extended ids back to words using the example's OOV list.
    pub fn extended_to_words(&self, ids: &[u32], oovs: &[String]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| {
                if (id as usize) < self.size() {
                    self.id_to_word(id).map(str::to_string)
                } else {
                    oovs.get(id as usize - self.size())
                        .cloned()
                        .ok_or(ModelError::UnknownTokenId(id))
                }
            })
            .collect()
    }
}
