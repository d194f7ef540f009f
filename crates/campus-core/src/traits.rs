/// The embedding model boundary.
///
/// Implementations must be deterministic: the same text always maps to the
/// same vector, so persisted indices stay valid across restarts for as long
/// as `model_id` and `dim` are unchanged.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `hash:xxh64:d512`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for a single input"))
    }
}
