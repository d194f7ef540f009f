//! campus-retrieval
//!
//! The retrieval engine: chunk documents, embed passages, build a vector
//! index, persist it, and serve similarity queries against the published
//! snapshot while rebuilds happen in the background.

mod engine;

pub use engine::{BuildReport, CancelToken, EngineOptions, IndexStats, RetrievalEngine};
