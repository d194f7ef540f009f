//! Configuration loader and typed retrieval settings.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nesting levels, e.g. `APP_RETRIEVAL__INDEX_PATH`).
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.retrieval()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed `[retrieval]` table; absent keys take their defaults.
    pub fn retrieval(&self) -> Result<RetrievalSettings> {
        if !self.figment.contains("retrieval") {
            return Ok(RetrievalSettings::default());
        }
        let settings: RetrievalSettings = self
            .figment
            .extract_inner("retrieval")
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Hash,
    Bge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategyKind {
    #[default]
    Exact,
    Ivf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub dim: usize,
    pub model_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { backend: EmbeddingBackend::Hash, dim: 512, model_dir: None } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub strategy: SearchStrategyKind,
    pub nprobe: usize,
    pub min_rows: usize,
}

impl Default for SearchSettings {
    fn default() -> Self { Self { strategy: SearchStrategyKind::Exact, nprobe: 8, min_rows: 256 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub index_path: String,
    pub max_passage_chars: usize,
    pub batch_size: usize,
    pub default_top_k: usize,
    pub min_score: f32,
    pub query_timeout_ms: u64,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            index_path: "./.cache/embeddings/index.snap".to_string(),
            max_passage_chars: 800,
            batch_size: 32,
            default_top_k: 5,
            min_score: 0.3,
            query_timeout_ms: 2000,
            embedding: EmbeddingSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.index_path.trim().is_empty() { return invalid("retrieval.index_path must not be empty"); }
        if self.max_passage_chars == 0 { return invalid("retrieval.max_passage_chars must be > 0"); }
        if self.batch_size == 0 { return invalid("retrieval.batch_size must be > 0"); }
        if self.default_top_k == 0 { return invalid("retrieval.default_top_k must be > 0"); }
        if self.min_score.is_nan() { return invalid("retrieval.min_score must be a number"); }
        if self.embedding.backend == EmbeddingBackend::Hash && self.embedding.dim == 0 {
            return invalid("retrieval.embedding.dim must be > 0");
        }
        if self.search.nprobe == 0 { return invalid("retrieval.search.nprobe must be > 0"); }
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf { expand_path(&self.index_path) }

    pub fn model_dir(&self) -> Option<PathBuf> { self.embedding.model_dir.as_deref().map(expand_path) }

    pub fn query_timeout(&self) -> Duration { Duration::from_millis(self.query_timeout_ms) }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(toml: &str) -> Config { Config::from_figment(Figment::new().merge(Toml::string(toml))) }

    #[test]
    fn missing_table_uses_defaults() {
        let settings = config_from("").retrieval().expect("defaults");
        assert_eq!(settings.max_passage_chars, 800);
        assert_eq!(settings.search.strategy, SearchStrategyKind::Exact);
        assert_eq!(settings.embedding.backend, EmbeddingBackend::Hash);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let settings = config_from(
            r#"
            [retrieval]
            index_path = "/var/campus/index.snap"
            min_score = 0.45

            [retrieval.search]
            strategy = "ivf"
            nprobe = 4
            "#,
        )
        .retrieval()
        .expect("settings");
        assert_eq!(settings.index_path(), PathBuf::from("/var/campus/index.snap"));
        assert!((settings.min_score - 0.45).abs() < f32::EPSILON);
        assert_eq!(settings.search.strategy, SearchStrategyKind::Ivf);
        assert_eq!(settings.search.nprobe, 4);
        assert_eq!(settings.search.min_rows, 256);
        assert_eq!(settings.batch_size, 32);
    }

    #[test]
    fn zero_chunk_bound_is_rejected() {
        let err = config_from("[retrieval]\nmax_passage_chars = 0\n").retrieval().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = config_from("[retrieval.embedding]\nbackend = \"word2vec\"\n").retrieval().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn expand_path_expands_env_vars() {
        std::env::set_var("CAMPUS_CFG_TEST_DIR", "/srv/campus");
        assert_eq!(expand_path("${CAMPUS_CFG_TEST_DIR}/index.snap"), PathBuf::from("/srv/campus/index.snap"));
    }
}
