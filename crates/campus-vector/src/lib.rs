//! campus-vector
//!
//! In-memory vector index over L2-normalized embeddings with pluggable
//! candidate strategies (exact scan, inverted file) and a checksummed,
//! atomically written snapshot format.
//!
//! Typical flow:
//! 1) `VectorIndex::new` with the embedder's dimension and a strategy
//! 2) `add` vectors and their passages (validated, then strategy rebuilt)
//! 3) `search` ranks by cosine similarity, ties by ascending passage id
//! 4) `save` / `VectorIndex::load` persist and restore without re-embedding

pub mod index;
pub mod snapshot;
pub mod strategy;

pub use index::{Rows, VectorIndex};
pub use strategy::{Candidates, ExactScan, InvertedFile, SearchStrategy, StrategyConfig};
