//! campus-embed
//!
//! Embedding model implementations behind `campus_core::traits::Embedder`:
//! a deterministic hashing model (default) and, with the `candle` feature,
//! the BGE-M3 transformer loaded from local weights.
use anyhow::{anyhow, Result};
use std::sync::Arc;

use campus_core::config::{EmbeddingBackend, RetrievalSettings};
use campus_core::traits::Embedder;

mod hashing;
pub use hashing::HashEmbedder;

#[cfg(feature = "candle")]
mod bge;

#[cfg(feature = "candle")]
pub use bge::{masked_mean_l2, BgeM3Embedder};

/// Build the embedder selected by `retrieval.embedding.backend`.
pub fn embedder_from_settings(settings: &RetrievalSettings) -> Result<Arc<dyn Embedder>> {
    match settings.embedding.backend {
        EmbeddingBackend::Hash => {
            if settings.embedding.dim == 0 { return Err(anyhow!("hash embedder dimension must be > 0")); }
            tracing::info!(dim = settings.embedding.dim, "using hashing embedder");
            Ok(Arc::new(HashEmbedder::new(settings.embedding.dim)))
        }
        EmbeddingBackend::Bge => load_bge(settings),
    }
}

#[cfg(feature = "candle")]
fn load_bge(settings: &RetrievalSettings) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(BgeM3Embedder::new(settings.model_dir().as_deref())?))
}

#[cfg(not(feature = "candle"))]
fn load_bge(_settings: &RetrievalSettings) -> Result<Arc<dyn Embedder>> {
    Err(anyhow!("embedding backend 'bge' requires campus-embed to be built with the `candle` feature"))
}
