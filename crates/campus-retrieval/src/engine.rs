use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

use campus_core::chunker::TextChunker;
use campus_core::config::RetrievalSettings;
use campus_core::traits::Embedder;
use campus_core::types::{ScoredPassage, SourceDocument};
use campus_core::{Error, Result};
use campus_embed::embedder_from_settings;
use campus_vector::{StrategyConfig, VectorIndex};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub index_path: PathBuf,
    pub max_passage_chars: usize,
    pub batch_size: usize,
    pub strategy: StrategyConfig,
    pub query_timeout: Duration,
}

impl EngineOptions {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self::from_settings(&RetrievalSettings::default()).with_index_path(index_path)
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            index_path: settings.index_path(),
            max_passage_chars: settings.max_passage_chars,
            batch_size: settings.batch_size.max(1),
            strategy: StrategyConfig::from_settings(&settings.search),
            query_timeout: settings.query_timeout(),
        }
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Cooperative cancellation flag for long-running builds.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub passages: usize,
    pub dim: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub passages: usize,
    pub dim: usize,
    pub sources: usize,
    pub strategy: &'static str,
}

struct Inner {
    embedder: Arc<dyn Embedder>,
    options: EngineOptions,
    chunker: TextChunker,
    current: RwLock<Option<Arc<VectorIndex>>>,
    build_guard: Mutex<()>,
}

/// Shared handle to the engine. Clones refer to the same published index.
///
/// Queries run against an immutable `Arc<VectorIndex>`; a build prepares a
/// complete replacement, persists it and then swaps the pointer, so readers
/// never observe a partially built index.
#[derive(Clone)]
pub struct RetrievalEngine {
    inner: Arc<Inner>,
}

impl RetrievalEngine {
    /// Engine with no published index.
    pub fn new(embedder: Arc<dyn Embedder>, options: EngineOptions) -> Self {
        let chunker = TextChunker::new(options.max_passage_chars);
        Self {
            inner: Arc::new(Inner {
                embedder,
                options,
                chunker,
                current: RwLock::new(None),
                build_guard: Mutex::new(()),
            }),
        }
    }

    /// Engine that publishes the persisted snapshot if one is usable. A
    /// missing or rejected snapshot leaves the engine serving empty results.
    pub fn open(embedder: Arc<dyn Embedder>, options: EngineOptions) -> Self {
        let engine = Self::new(embedder, options);
        if let Err(e) = engine.reload() {
            tracing::warn!(error = %e, "starting without an index");
        }
        engine
    }

    /// Opens an engine with the embedder and options described by `settings`.
    pub fn from_settings(settings: &RetrievalSettings) -> Result<Self> {
        let embedder = embedder_from_settings(settings).map_err(|e| Error::EmbeddingFailure(format!("{e:#}")))?;
        Ok(Self::open(embedder, EngineOptions::from_settings(settings)))
    }

    pub fn options(&self) -> &EngineOptions { &self.inner.options }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.inner.embedder }

    pub fn has_index(&self) -> bool { self.current().is_some() }

    pub fn build_index(&self, documents: &[SourceDocument]) -> Result<BuildReport> {
        self.build_index_cancellable(documents, &CancelToken::new())
    }

    /// Replaces the published index with one built from `documents`.
    ///
    /// Only one build runs at a time; a call made while another build, a
    /// `load` or a `save` holds the engine fails with `BuildInProgress`. On
    /// any error, including cancellation, the previously published index
    /// keeps serving.
    #[tracing::instrument(skip_all, fields(documents = documents.len()))]
    pub fn build_index_cancellable(&self, documents: &[SourceDocument], cancel: &CancelToken) -> Result<BuildReport> {
        let _guard = match self.inner.build_guard.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(Error::BuildInProgress),
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        let start = Instant::now();
        let embedder = &self.inner.embedder;
        let dim = embedder.dim();

        let passages = self.inner.chunker.passages(documents, 0);
        tracing::info!(passages = passages.len(), model = embedder.model_id(), "embedding passages");

        let mut vectors = Vec::with_capacity(passages.len());
        for batch in passages.chunks(self.inner.options.batch_size) {
            if cancel.is_cancelled() {
                tracing::info!(embedded = vectors.len(), "build cancelled");
                return Err(Error::Cancelled);
            }
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let embedded = embedder.embed_batch(&texts).map_err(|e| Error::EmbeddingFailure(format!("{e:#}")))?;
            if embedded.len() != batch.len() {
                return Err(Error::CountMismatch { vectors: embedded.len(), passages: batch.len() });
            }
            if let Some(v) = embedded.iter().find(|v| v.len() != dim) {
                return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
            }
            vectors.extend(embedded);
        }

        let passage_count = passages.len();
        let mut index = VectorIndex::new(dim, self.inner.options.strategy)?;
        index.add(vectors, passages)?;

        if cancel.is_cancelled() {
            tracing::info!("build cancelled before persisting");
            return Err(Error::Cancelled);
        }
        index.save(&self.inner.options.index_path)?;
        self.publish(index);

        let report = BuildReport { documents: documents.len(), passages: passage_count, dim, elapsed: start.elapsed() };
        tracing::info!(passages = report.passages, elapsed_ms = report.elapsed.as_millis() as u64, "index published");
        Ok(report)
    }

    /// Top `k` passages scoring at least `min_score`, best first. Without a
    /// published index the result is empty.
    pub fn query(&self, text: &str, k: usize, min_score: f32) -> Result<Vec<ScoredPassage>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be > 0".to_string()));
        }
        if min_score.is_nan() {
            return Err(Error::InvalidArgument("min_score must be a number".to_string()));
        }
        let Some(index) = self.current() else {
            tracing::debug!("query without a published index");
            return Ok(Vec::new());
        };
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.inner.embedder.embed(text).map_err(|e| Error::EmbeddingFailure(format!("{e:#}")))?;
        let mut hits = index.search(&query, k)?;
        hits.retain(|h| h.score >= min_score);
        tracing::debug!(hits = hits.len(), k, min_score, "query served");
        Ok(hits)
    }

    /// `query` on the blocking pool, abandoned with `Timeout` once `timeout`
    /// elapses.
    pub async fn query_with_timeout(
        &self,
        text: &str,
        k: usize,
        min_score: f32,
        timeout: Duration,
    ) -> Result<Vec<ScoredPassage>> {
        let engine = self.clone();
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || engine.query(&text, k, min_score));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(Error::EmbeddingFailure(format!("query task failed: {join}"))),
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "query timed out");
                Err(Error::Timeout(timeout))
            }
        }
    }

    /// Re-reads the snapshot at the configured index path.
    pub fn reload(&self) -> Result<()> { self.load(&self.inner.options.index_path) }

    /// Publishes the snapshot at `path`. On failure the current index is kept.
    ///
    /// Waits for a running build to finish, so a snapshot read here is never
    /// published over the result of that build.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> Result<()> {
        let _guard = self.wait_for_build();
        match VectorIndex::load(path, Some(self.inner.embedder.dim()), self.inner.options.strategy) {
            Ok(index) => {
                tracing::info!(passages = index.len(), "index loaded");
                self.publish(index);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot rejected");
                Err(e)
            }
        }
    }

    /// Writes the published index to `path`, after any running build.
    pub fn save(&self, path: &Path) -> Result<()> {
        let _guard = self.wait_for_build();
        match self.current() {
            Some(index) => index.save(path),
            None => Err(Error::IndexUnavailable("no index has been built or loaded".to_string())),
        }
    }

    pub fn stats(&self) -> Option<IndexStats> {
        self.current().map(|index| IndexStats {
            passages: index.len(),
            dim: index.dim(),
            sources: index.passages().iter().map(|p| p.source_id.as_str()).collect::<HashSet<_>>().len(),
            strategy: index.strategy_name(),
        })
    }

    fn wait_for_build(&self) -> MutexGuard<'_, ()> {
        self.inner.build_guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<Arc<VectorIndex>> {
        self.inner.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish(&self, index: VectorIndex) {
        let index = Arc::new(index);
        *self.inner.current.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_embed::HashEmbedder;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn options_follow_settings() {
        let mut settings = RetrievalSettings::default();
        settings.batch_size = 7;
        settings.query_timeout_ms = 150;
        let options = EngineOptions::from_settings(&settings);
        assert_eq!(options.batch_size, 7);
        assert_eq!(options.query_timeout, Duration::from_millis(150));
        assert_eq!(options.strategy, StrategyConfig::Exact);
    }

    #[test]
    fn new_engine_has_no_index() {
        let engine = RetrievalEngine::new(Arc::new(HashEmbedder::new(32)), EngineOptions::new("unused.snap"));
        assert!(!engine.has_index());
        assert!(engine.stats().is_none());
        assert!(engine.query("anything", 3, 0.0).expect("query").is_empty());
        assert!(matches!(engine.save(Path::new("unused.snap")), Err(Error::IndexUnavailable(_))));
    }
}
