//! Application state: configuration, the history index, the in-memory corpus
//! and the optional OpenAI client.
//!
//! The corpus is seeded at startup from `CORPUS_PATH` (if set) and grows as
//! problems are accepted; with a path configured, every acceptance rewrites
//! that file. History lives in its own store and is reloaded on every operation.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{load_service_config_from_env, ServiceConfig};
use crate::domain::CorpusEntry;
use crate::generation::GenerationPolicy;
use crate::history::{HistoryIndex, JsonFileStore, MemoryStore};
use crate::openai::OpenAI;

const IN_MEMORY_HISTORY: &str = ":memory:";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corpus file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct AppState {
    pub config: ServiceConfig,
    /// Shared so blocking store work can move onto the blocking pool.
    pub history: Arc<HistoryIndex>,
    pub corpus: RwLock<Vec<CorpusEntry>>,
    pub openai: Option<OpenAI>,
}

impl AppState {
    /// Build state from env: load config, open the history store, seed the corpus, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_service_config_from_env();

        let history = if config.history.path == IN_MEMORY_HISTORY {
            info!(target: "history", "History kept in memory only");
            HistoryIndex::new(MemoryStore::new())
        } else {
            let store = JsonFileStore::new(&config.history.path);
            info!(target: "history", path = %store.path().display(), "History file store");
            HistoryIndex::new(store)
        };

        let corpus = match &config.corpus_path {
            Some(path) => load_corpus(path),
            None => Vec::new(),
        };

        let openai = OpenAI::from_env(config.prompts.clone());
        if let Some(oa) = &openai {
            info!(target: "mathdaily", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            info!(target: "mathdaily", "OpenAI disabled (no OPENAI_API_KEY). Generation endpoint unavailable.");
        }

        Self::from_parts(config, history, corpus, openai)
    }

    pub fn from_parts(
        config: ServiceConfig,
        history: HistoryIndex,
        corpus: Vec<CorpusEntry>,
        openai: Option<OpenAI>,
    ) -> Self {
        info!(target: "mathdaily", corpus = corpus.len(), history = history.records().len(), "Startup inventory");
        Self { config, history: Arc::new(history), corpus: RwLock::new(corpus), openai }
    }

    #[cfg(test)]
    pub fn ephemeral(config: ServiceConfig, store: impl crate::history::HistoryStore + 'static, corpus: Vec<CorpusEntry>) -> Self {
        Self::from_parts(config, HistoryIndex::new(store), corpus, None)
    }

    pub fn policy(&self) -> GenerationPolicy {
        self.config.policy()
    }
}

/// Read a JSON array of corpus entries. Entries that do not parse are skipped
/// with a warning; a missing or unreadable file yields an empty corpus.
#[instrument(level = "info", fields(path = %path.display()))]
pub fn load_corpus(path: &Path) -> Vec<CorpusEntry> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(target: "mathdaily", "No corpus file yet; starting with an empty corpus");
            return Vec::new();
        }
        Err(e) => {
            error!(target: "mathdaily", error = %e, "Failed to read corpus file; starting with an empty corpus");
            return Vec::new();
        }
    };
    let items: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            error!(target: "mathdaily", error = %e, "Corpus file is not a JSON array; starting with an empty corpus");
            return Vec::new();
        }
    };

    let total = items.len();
    let entries: Vec<CorpusEntry> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<CorpusEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(target: "mathdaily", index = i, error = %e, "Skipping malformed corpus entry");
                None
            }
        })
        .collect();

    info!(target: "mathdaily", loaded = entries.len(), skipped = total - entries.len(), "Corpus loaded");
    entries
}

/// Rewrite the whole corpus file in the shape [`load_corpus`] reads.
pub fn save_corpus(path: &Path, entries: &[CorpusEntry]) -> Result<(), CorpusError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    debug!(target: "mathdaily", path = %path.display(), entries = entries.len(), "Corpus saved");
    Ok(())
}
