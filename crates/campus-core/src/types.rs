//! Domain types shared by the chunker, the vector index and the engine.

use serde::{Deserialize, Serialize};

pub type PassageId = u64;

/// A document handed over by ingestion: already-extracted text plus the
/// caller's opaque identifier for the record it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub text: String,
    pub source_id: String,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self { text: text.into(), source_id: source_id.into() }
    }
}

impl<T: Into<String>, S: Into<String>> From<(T, S)> for SourceDocument {
    fn from((text, source_id): (T, S)) -> Self { Self::new(text, source_id) }
}

/// A bounded chunk of source text stored with its origin metadata.
///
/// - `id`: unique within one index, stable across snapshot round trips
/// - `source_id`: opaque identifier owned by the ingestion caller
/// - `chunk_index`: ordinal position of the passage within its source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub text: String,
    pub source_id: String,
    pub chunk_index: usize,
}

/// A search result. `score` is cosine similarity; higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}
