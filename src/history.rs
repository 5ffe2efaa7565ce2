//! Append-only history of accepted problems with hash fingerprints.
//!
//! The index owns a [`HistoryStore`] behind a mutex. Every operation runs a full
//! load (and, for mutations, save) inside that critical section, so concurrent
//! acceptances cannot lose each other's records.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::concepts::{extract_keywords, jaccard};
use crate::domain::{Category, Difficulty, Problem};
use crate::text::fingerprint_hash;

pub const DEFAULT_HISTORY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MAX_RECORDS: usize = 1000;
const MAX_REPORTED_MATCHES: usize = 5;

const TITLE_HASH_WEIGHT: f64 = 0.4;
const CONTENT_HASH_WEIGHT: f64 = 0.4;
const KEYWORD_WEIGHT: f64 = 0.2;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One accepted problem. Created once on acceptance and never mutated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub keywords: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
    pub title_hash: u32,
    pub content_hash: u32,
}

impl HistoryRecord {
    pub fn new(problem: &Problem, file_path: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let fp = Fingerprint::of(problem);
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}_{}", created_at.timestamp_millis(), &suffix[..9]),
            title: problem.title.clone(),
            category: problem.category,
            difficulty: problem.difficulty,
            keywords: fp.keywords,
            created_at,
            file_path: file_path.into(),
            title_hash: fp.title_hash,
            content_hash: fp.content_hash,
        }
    }
}

/// The cheap comparison key of a problem.
#[derive(Clone, Debug, PartialEq)]
pub struct Fingerprint {
    pub title_hash: u32,
    pub content_hash: u32,
    pub keywords: BTreeSet<String>,
}

impl Fingerprint {
    pub fn of(problem: &Problem) -> Self {
        Self {
            title_hash: fingerprint_hash(&problem.title),
            content_hash: fingerprint_hash(&format!("{}{}", problem.title, problem.description)),
            keywords: extract_keywords(&problem.title, &problem.description),
        }
    }

    /// Composite of exact hash matches and keyword Jaccard.
    pub fn similarity_to(&self, record: &HistoryRecord) -> f64 {
        let title = if record.title_hash == self.title_hash { 1.0 } else { 0.0 };
        let content = if record.content_hash == self.content_hash { 1.0 } else { 0.0 };
        title * TITLE_HASH_WEIGHT
            + content * CONTENT_HASH_WEIGHT
            + jaccard(&record.keywords, &self.keywords) * KEYWORD_WEIGHT
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryMatch {
    pub record: HistoryRecord,
    pub similarity: f64,
    pub common_keywords: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryCheck {
    pub has_similar: bool,
    /// At most five matches, most similar first.
    pub similar_records: Vec<HistoryMatch>,
    pub highest_similarity: f64,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct HistoryStatistics {
    pub total_problems: usize,
    pub category_distribution: BTreeMap<Category, usize>,
    pub difficulty_distribution: BTreeMap<Difficulty, usize>,
    pub keyword_frequency: BTreeMap<String, usize>,
    /// Records created per `YYYY-MM`.
    pub creation_trend: BTreeMap<String, usize>,
}

impl HistoryStatistics {
    pub fn from_records(records: &[HistoryRecord]) -> Self {
        let mut stats = HistoryStatistics { total_problems: records.len(), ..Default::default() };
        for r in records {
            *stats.category_distribution.entry(r.category).or_default() += 1;
            *stats.difficulty_distribution.entry(r.difficulty).or_default() += 1;
            for k in &r.keywords {
                *stats.keyword_frequency.entry(k.clone()).or_default() += 1;
            }
            let month = r.created_at.format("%Y-%m").to_string();
            *stats.creation_trend.entry(month).or_default() += 1;
        }
        stats
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryExport {
    pub exported_at: String,
    pub statistics: HistoryStatistics,
    pub problems: Vec<HistoryRecord>,
}

/// Persistence port for the history index.
pub trait HistoryStore: Send {
    /// All stored records; an absent store yields an empty list.
    fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError>;
    /// Replace the stored records wholesale.
    fn save(&mut self, records: &[HistoryRecord]) -> Result<(), HistoryError>;
}

/// A pretty-printed JSON array on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(records)?;
        // write-then-rename keeps the previous file intact if we die mid-write
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Records kept in memory only.
#[derive(Default)]
pub struct MemoryStore {
    records: Vec<HistoryRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_records(records: Vec<HistoryRecord>) -> Self {
        Self { records }
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        Ok(self.records.clone())
    }

    fn save(&mut self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        self.records = records.to_vec();
        Ok(())
    }
}

pub struct HistoryIndex {
    store: Mutex<Box<dyn HistoryStore>>,
}

impl HistoryIndex {
    pub fn new(store: impl HistoryStore + 'static) -> Self {
        Self { store: Mutex::new(Box::new(store)) }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn HistoryStore>> {
        // The store is reloaded on every call, so a poisoned guard holds no stale state.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_locked(store: &dyn HistoryStore) -> Vec<HistoryRecord> {
        match store.load() {
            Ok(records) => records,
            Err(e) => {
                warn!(target: "history", error = %e, "Failed to load problem history; treating as empty");
                Vec::new()
            }
        }
    }

    /// All records in stored order.
    pub fn records(&self) -> Vec<HistoryRecord> {
        let store = self.lock();
        Self::load_locked(&**store)
    }

    /// Append a record for `problem` and persist the whole list. Returns the new id.
    #[instrument(level = "info", skip(self, problem), fields(title_len = problem.title.len(), category = problem.category.id()))]
    pub fn add(&self, problem: &Problem, file_path: &str) -> Result<String, HistoryError> {
        self.add_at(problem, file_path, Utc::now())
    }

    pub fn add_at(&self, problem: &Problem, file_path: &str, created_at: DateTime<Utc>) -> Result<String, HistoryError> {
        let mut store = self.lock();
        let mut records = Self::load_locked(&**store);
        let record = HistoryRecord::new(problem, file_path, created_at);
        let id = record.id.clone();
        records.push(record);
        store.save(&records)?;
        info!(target: "history", %id, total = records.len(), "Added problem to history");
        Ok(id)
    }

    /// Fingerprint comparison of `candidate` against every stored record.
    #[instrument(level = "debug", skip(self, candidate), fields(title_len = candidate.title.len()))]
    pub fn check_similarity(&self, candidate: &Problem, threshold: f64) -> HistoryCheck {
        let records = self.records();
        let fp = Fingerprint::of(candidate);

        let mut matches: Vec<HistoryMatch> = records
            .into_iter()
            .filter_map(|record| {
                let similarity = fp.similarity_to(&record);
                if similarity < threshold {
                    return None;
                }
                let common_keywords = record.keywords.intersection(&fp.keywords).cloned().collect();
                Some(HistoryMatch { record, similarity, common_keywords })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        let highest_similarity = matches.first().map_or(0.0, |m| m.similarity);
        matches.truncate(MAX_REPORTED_MATCHES);

        debug!(target: "history", matches = matches.len(), highest = highest_similarity, "History similarity checked");
        HistoryCheck { has_similar: !matches.is_empty(), similar_records: matches, highest_similarity }
    }

    /// Keep the `max_records` most recent records. Returns how many were removed.
    #[instrument(level = "info", skip(self))]
    pub fn cleanup(&self, max_records: usize) -> Result<usize, HistoryError> {
        let mut store = self.lock();
        let mut records = Self::load_locked(&**store);
        if records.len() <= max_records {
            return Ok(0);
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let removed = records.len() - max_records;
        records.truncate(max_records);
        store.save(&records)?;

        info!(target: "history", removed, kept = records.len(), "Cleaned up old history records");
        Ok(removed)
    }

    pub fn statistics(&self) -> HistoryStatistics {
        HistoryStatistics::from_records(&self.records())
    }

    pub fn export(&self) -> HistoryExport {
        let problems = self.records();
        HistoryExport {
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            statistics: HistoryStatistics::from_records(&problems),
            problems,
        }
    }
}
