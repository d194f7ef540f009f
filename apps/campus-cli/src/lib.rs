//! Shared plumbing for the `campus-indexer` and `campus-search` binaries.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use campus_core::types::SourceDocument;

pub const FAQS_FILE: &str = "faqs.csv";
pub const EVENTS_FILE: &str = "events.csv";

#[derive(Debug, Deserialize)]
struct FaqRow {
    question: String,
    answer: String,
}

#[derive(Debug, Deserialize)]
struct EventRow {
    title: String,
    #[serde(default)]
    description: String,
}

/// Logs go to stderr; `RUST_LOG` overrides the default level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).try_init();
}

/// Collects every document under `data_dir`:
/// - each `*.txt` file (recursively), keyed by its file stem
/// - rows of `faqs.csv` as `faq_<n>`
/// - rows of `events.csv` as `event_<n>`
pub fn load_documents(data_dir: &Path) -> Result<Vec<SourceDocument>> {
    if !data_dir.is_dir() {
        anyhow::bail!("data directory {} does not exist", data_dir.display());
    }
    let mut documents = load_text_files(data_dir)?;
    let faqs = data_dir.join(FAQS_FILE);
    if faqs.exists() {
        documents.extend(load_faqs(&faqs)?);
    }
    let events = data_dir.join(EVENTS_FILE);
    if events.exists() {
        documents.extend(load_events(&events)?);
    }
    Ok(documents)
}

pub fn load_text_files(dir: &Path) -> Result<Vec<SourceDocument>> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => String::from_utf8_lossy(&fs::read(&path)?).into_owned(),
        };
        let Some(stem) = path.file_stem() else { continue };
        tracing::debug!(path = %path.display(), "loaded text file");
        documents.push(SourceDocument::new(text, stem.to_string_lossy()));
    }
    Ok(documents)
}

pub fn load_faqs(path: &Path) -> Result<Vec<SourceDocument>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut documents = Vec::new();
    for (i, row) in reader.deserialize::<FaqRow>().enumerate() {
        let row = row.with_context(|| format!("{} row {}", path.display(), i + 1))?;
        documents.push(SourceDocument::new(
            format!("FAQ: {} Answer: {}", row.question.trim(), row.answer.trim()),
            format!("faq_{}", i + 1),
        ));
    }
    Ok(documents)
}

pub fn load_events(path: &Path) -> Result<Vec<SourceDocument>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut documents = Vec::new();
    for (i, row) in reader.deserialize::<EventRow>().enumerate() {
        let row = row.with_context(|| format!("{} row {}", path.display(), i + 1))?;
        documents.push(SourceDocument::new(
            format!("Event: {} Description: {}", row.title.trim(), row.description.trim()),
            format!("event_{}", i + 1),
        ));
    }
    Ok(documents)
}
