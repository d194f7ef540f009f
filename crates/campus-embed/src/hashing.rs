//! Deterministic feature-hashing embedder.
//!
//! Each lower-cased word contributes a unigram feature and its
//! boundary-padded character trigrams (`#open#` -> `#op`, `ope`, `pen`,
//! `en#`), hashed with xxHash64 into a signed bucket. Trigrams let
//! inflections such as "open"/"opens" overlap. Output is L2-normalized.
use std::hash::Hasher;

use twox_hash::XxHash64;

use campus_core::traits::Embedder;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;
/// Tokens beyond this are ignored.
const MAX_TOKENS: usize = 4096;

// sorted for binary_search
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how", "i", "in",
    "is", "it", "me", "my", "of", "on", "or", "the", "to", "was", "what", "when", "where", "which", "who",
    "why", "will", "with",
];

pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:xxh64:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text).take(MAX_TOKENS) {
            self.accumulate(&mut v, b'w', &token, WORD_WEIGHT);
            let padded: Vec<char> = std::iter::once('#').chain(token.chars()).chain(std::iter::once('#')).collect();
            for tri in padded.windows(3) {
                let gram: String = tri.iter().collect();
                self.accumulate(&mut v, b'g', &gram, TRIGRAM_WEIGHT);
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }

    fn accumulate(&self, v: &mut [f32], kind: u8, feature: &str, weight: f32) {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write_u8(kind);
        hasher.write(feature.as_bytes());
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
        v[idx] += sign * weight;
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| STOP_WORDS.binary_search(&t.as_str()).is_err())
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { MAX_TOKENS }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
