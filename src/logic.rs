//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Scoring pairs and checking candidates against the corpus and history
//!   - The acceptance gate (re-check, then record in history and corpus)
//!   - Generating a unique problem through the configured source
//!   - History maintenance (cleanup, statistics, export)
//!
//! Store writes (history file, corpus file) run on the blocking pool.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::{Category, CorpusEntry, Problem, ProblemError};
use crate::generation::{generate_unique, resolve_category, screen, GenerationError, ProblemSource, Rejection};
use crate::history::{HistoryCheck, HistoryError, HistoryExport, HistoryRecord, HistoryStatistics};
use crate::protocol::{AcceptedOut, CategoryOut, CleanupOut, CorpusEntryOut, DuplicateCheckOut, GeneratedOut, UniquenessReportOut};
use crate::scanner::{check_for_duplicates, problems_in_category, uniqueness_report};
use crate::similarity::{score, SimilarityResult};
use crate::state::{save_corpus, AppState, CorpusError};

const DEFAULT_LISTING_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("invalid problem: {0}")]
  Invalid(#[from] ProblemError),

  #[error("unknown category: {0}")]
  UnknownCategory(String),

  #[error("problem rejected: {0}")]
  Rejected(Rejection),

  #[error("problem generation is not configured (set OPENAI_API_KEY)")]
  GenerationDisabled,

  #[error(transparent)]
  Generation(GenerationError),

  #[error(transparent)]
  History(#[from] HistoryError),

  #[error(transparent)]
  Corpus(#[from] CorpusError),

  #[error("store task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl From<GenerationError> for ServiceError {
  fn from(e: GenerationError) -> Self {
    match e {
      GenerationError::UnknownCategory(c) => ServiceError::UnknownCategory(c),
      other => ServiceError::Generation(other),
    }
  }
}

pub fn categories() -> Vec<CategoryOut> {
  Category::ALL.into_iter().map(Into::into).collect()
}

pub fn score_pair(a: &Problem, b: &Problem) -> SimilarityResult {
  score(a, b)
}

#[instrument(level = "info", skip(state, candidate), fields(title_len = candidate.title.len()))]
pub async fn check_duplicates(state: &AppState, candidate: &Problem, threshold: Option<f64>) -> DuplicateCheckOut {
  let threshold = threshold.unwrap_or(state.config.dedup.duplicate_threshold);
  let corpus = state.corpus.read().await;
  let check = check_for_duplicates(candidate, &corpus, threshold);
  let out = DuplicateCheckOut::from(&check);
  out
}

#[instrument(level = "info", skip(state))]
pub async fn uniqueness(state: &AppState) -> UniquenessReportOut {
  let corpus = state.corpus.read().await;
  let report = uniqueness_report(&corpus);
  let out = UniquenessReportOut::from(&report);
  out
}

#[instrument(level = "info", skip(state))]
pub async fn list_category(state: &AppState, category: &str, limit: Option<usize>) -> Result<Vec<CorpusEntryOut>, ServiceError> {
  let category = Category::from_label(category).ok_or_else(|| ServiceError::UnknownCategory(category.to_string()))?;
  let corpus = state.corpus.read().await;
  let listed: Vec<CorpusEntryOut> = problems_in_category(&corpus, category, limit.unwrap_or(DEFAULT_LISTING_LIMIT))
    .iter()
    .map(Into::into)
    .collect();
  Ok(listed)
}

pub fn check_history(state: &AppState, candidate: &Problem, threshold: Option<f64>) -> HistoryCheck {
  state.history.check_similarity(candidate, threshold.unwrap_or(state.config.dedup.history_threshold))
}

pub fn history_records(state: &AppState) -> Vec<HistoryRecord> {
  state.history.records()
}

pub fn history_stats(state: &AppState) -> HistoryStatistics {
  state.history.statistics()
}

pub fn history_export(state: &AppState) -> HistoryExport {
  state.history.export()
}

#[instrument(level = "info", skip(state))]
pub async fn cleanup_history(state: &AppState, max_records: Option<usize>) -> Result<CleanupOut, ServiceError> {
  let max_records = max_records.unwrap_or(state.config.history.max_records);
  let history = Arc::clone(&state.history);
  let out = tokio::task::spawn_blocking(move || -> Result<CleanupOut, HistoryError> {
    let removed = history.cleanup(max_records)?;
    Ok(CleanupOut { removed, remaining: history.records().len() })
  })
  .await??;
  Ok(out)
}

fn default_file_path(problem: &Problem) -> String {
  format!("questions/{}/{}-problem.md", problem.category.folder(), Utc::now().format("%Y-%m-%d"))
}

/// Acceptance gate: validate, re-check corpus and history, then record the
/// problem in both. The corpus write lock is held throughout, so two
/// concurrent submissions of the same problem cannot both pass.
///
/// The corpus file (when configured) is written before the history record; the
/// in-memory corpus only changes once both writes succeeded.
#[instrument(level = "info", skip(state, problem, file_path), fields(title_len = problem.title.len(), category = problem.category.id()))]
pub async fn accept_problem(state: &AppState, problem: Problem, file_path: Option<String>) -> Result<AcceptedOut, ServiceError> {
  problem.validate()?;

  let mut corpus = state.corpus.write().await;
  let screening = screen(&problem, &corpus, &state.history, &state.policy());
  if let Some(rejection) = screening.rejection {
    warn!(target: "mathdaily", %rejection, "Problem rejected at acceptance");
    return Err(ServiceError::Rejected(rejection));
  }

  let file_path = file_path.filter(|p| !p.trim().is_empty()).unwrap_or_else(|| default_file_path(&problem));
  let mut updated = corpus.clone();
  updated.push(CorpusEntry { path: file_path.clone(), problem: problem.clone() });

  let history = Arc::clone(&state.history);
  let corpus_path = state.config.corpus_path.clone();
  let record = problem.clone();
  let record_path = file_path.clone();
  let (id, updated) = tokio::task::spawn_blocking(move || -> Result<(String, Vec<CorpusEntry>), ServiceError> {
    if let Some(path) = &corpus_path {
      save_corpus(path, &updated)?;
    }
    let id = history.add(&record, &record_path)?;
    Ok((id, updated))
  })
  .await??;
  *corpus = updated;

  info!(target: "mathdaily", %id, %file_path, corpus = corpus.len(), "Problem accepted");
  Ok(AcceptedOut { id, file_path, problem })
}

/// Generate through `source`, then run the winner through the acceptance gate.
#[instrument(level = "info", skip(state, source))]
pub async fn generate_with(state: &AppState, source: &dyn ProblemSource, category: Option<&str>) -> Result<GeneratedOut, ServiceError> {
  let category = resolve_category(category)?;
  // snapshot so the model round-trips do not hold the corpus lock
  let corpus = state.corpus.read().await.clone();
  let generated = generate_unique(source, category, &corpus, &state.history, &state.policy()).await?;
  let accepted = accept_problem(state, generated.problem, None).await?;
  Ok(GeneratedOut { accepted, attempts: generated.attempts })
}

pub async fn generate_problem(state: &AppState, category: Option<&str>) -> Result<GeneratedOut, ServiceError> {
  let Some(oa) = &state.openai else {
    return Err(ServiceError::GenerationDisabled);
  };
  generate_with(state, oa, category).await
}
