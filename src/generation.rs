//! Generate-and-check workflow.
//!
//! A [`ProblemSource`] proposes candidates; [`screen`] runs them through the
//! corpus and history gates; [`generate_unique`] retries a bounded number of
//! times, feeding rejected titles back into the next request.

use std::fmt;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Category, CorpusEntry, Problem};
use crate::history::{HistoryIndex, DEFAULT_HISTORY_THRESHOLD};
use crate::scanner::{check_for_duplicates, DEFAULT_DUPLICATE_THRESHOLD};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("model request failed: {0}")]
  Model(String),

  #[error("model returned an unusable problem: {0}")]
  InvalidResponse(String),

  #[error("unknown category: {0}")]
  UnknownCategory(String),

  #[error("no unique problem after {attempts} attempt(s); last rejection: {last_rejection}")]
  Exhausted { attempts: u32, last_rejection: String },
}

/// Anything that can propose a problem for a category.
#[async_trait]
pub trait ProblemSource: Send + Sync {
  /// `avoid` lists titles the new problem must not resemble.
  async fn generate(&self, category: Category, avoid: &[String]) -> Result<Problem, GenerationError>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationPolicy {
  pub max_attempts: u32,
  pub duplicate_threshold: f64,
  pub history_threshold: f64,
}

impl Default for GenerationPolicy {
  fn default() -> Self {
    Self {
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
      history_threshold: DEFAULT_HISTORY_THRESHOLD,
    }
  }
}

/// Why a candidate did not pass the gate.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
  Invalid { message: String },
  CorpusDuplicate { title: String, path: String, similarity: f64 },
  HistoryMatch { title: String, record_id: String, similarity: f64 },
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Rejection::Invalid { message } => write!(f, "invalid problem: {message}"),
      Rejection::CorpusDuplicate { title, path, similarity } => {
        write!(f, "duplicate of '{title}' ({path}), similarity {similarity:.2}")
      }
      Rejection::HistoryMatch { title, record_id, similarity } => {
        write!(f, "matches history record '{title}' ({record_id}), similarity {similarity:.2}")
      }
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Screening {
  pub rejection: Option<Rejection>,
  /// Titles of corpus and history problems close to the candidate.
  pub conflicting_titles: Vec<String>,
}

/// Run `candidate` through validation, the corpus duplicate check and the
/// history check, in that order. Merely similar corpus problems do not reject.
pub fn screen(
  candidate: &Problem,
  corpus: &[CorpusEntry],
  history: &HistoryIndex,
  policy: &GenerationPolicy,
) -> Screening {
  if let Err(e) = candidate.validate() {
    return Screening {
      rejection: Some(Rejection::Invalid { message: e.to_string() }),
      conflicting_titles: Vec::new(),
    };
  }

  let corpus_check = check_for_duplicates(candidate, corpus, policy.duplicate_threshold);
  let mut conflicting_titles = corpus_check.conflicting_titles();
  if let Some(top) = corpus_check.duplicates.first() {
    return Screening {
      rejection: Some(Rejection::CorpusDuplicate {
        title: top.entry.problem.title.clone(),
        path: top.entry.path.clone(),
        similarity: top.similarity.overall,
      }),
      conflicting_titles,
    };
  }
  if !corpus_check.similar_problems.is_empty() {
    debug!(target: "generation", similar = corpus_check.similar_problems.len(), "Candidate resembles corpus problems");
  }

  let history_check = history.check_similarity(candidate, policy.history_threshold);
  conflicting_titles.extend(history_check.similar_records.iter().map(|m| m.record.title.clone()));
  let rejection = history_check.similar_records.first().map(|m| Rejection::HistoryMatch {
    title: m.record.title.clone(),
    record_id: m.record.id.clone(),
    similarity: m.similarity,
  });

  Screening { rejection, conflicting_titles }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Generated {
  pub problem: Problem,
  /// 1-based index of the attempt that produced `problem`.
  pub attempts: u32,
}

/// Ask `source` for up to `policy.max_attempts` candidates and return the first
/// one that passes [`screen`]. A failed source call spends an attempt.
#[instrument(level = "info", skip(source, category, corpus, history, policy), fields(category = category.id(), max_attempts = policy.max_attempts))]
pub async fn generate_unique(
  source: &dyn ProblemSource,
  category: Category,
  corpus: &[CorpusEntry],
  history: &HistoryIndex,
  policy: &GenerationPolicy,
) -> Result<Generated, GenerationError> {
  let mut avoid: Vec<String> = Vec::new();
  let mut last_rejection = String::from("no attempt was made");

  for attempt in 1..=policy.max_attempts {
    let candidate = match source.generate(category, &avoid).await {
      Ok(p) => p,
      Err(e) => {
        warn!(target: "generation", attempt, error = %e, "Problem source failed");
        last_rejection = e.to_string();
        continue;
      }
    };

    let screening = screen(&candidate, corpus, history, policy);
    let Some(rejection) = screening.rejection else {
      info!(target: "generation", attempt, title_len = candidate.title.len(), "Unique problem generated");
      return Ok(Generated { problem: candidate, attempts: attempt });
    };

    warn!(target: "generation", attempt, %rejection, "Candidate rejected");
    last_rejection = rejection.to_string();
    let rejected_title = candidate.title.trim().to_string();
    for title in screening.conflicting_titles.into_iter().chain(std::iter::once(rejected_title)) {
      if !title.is_empty() && !avoid.contains(&title) {
        avoid.push(title);
      }
    }
  }

  Err(GenerationError::Exhausted { attempts: policy.max_attempts, last_rejection })
}

pub fn random_category() -> Category {
  Category::ALL
    .choose(&mut rand::thread_rng())
    .copied()
    .unwrap_or(Category::Differential)
}

/// Category by id or Chinese name; a random one when none is given.
pub fn resolve_category(requested: Option<&str>) -> Result<Category, GenerationError> {
  match requested.map(str::trim).filter(|s| !s.is_empty()) {
    None => Ok(random_category()),
    Some(s) => Category::from_label(s).ok_or_else(|| GenerationError::UnknownCategory(s.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;
  use std::sync::Mutex;

  use super::*;
  use crate::domain::Difficulty;
  use crate::history::MemoryStore;
  use crate::similarity::fixtures::*;

  /// Replays canned answers and records every avoid list it was given.
  struct Scripted {
    answers: Mutex<VecDeque<Result<Problem, GenerationError>>>,
    seen_avoid: Mutex<Vec<Vec<String>>>,
  }

  impl Scripted {
    fn new(answers: Vec<Result<Problem, GenerationError>>) -> Self {
      Self { answers: Mutex::new(answers.into()), seen_avoid: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<Vec<String>> {
      self.seen_avoid.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl ProblemSource for Scripted {
    async fn generate(&self, _category: Category, avoid: &[String]) -> Result<Problem, GenerationError> {
      self.seen_avoid.lock().unwrap().push(avoid.to_vec());
      self.answers
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(GenerationError::Model("script exhausted".into())))
    }
  }

  fn corpus_with(problem: Problem) -> Vec<CorpusEntry> {
    vec![CorpusEntry { path: "problems/existing.md".into(), problem }]
  }

  #[tokio::test]
  async fn first_unique_candidate_is_returned() {
    let source = Scripted::new(vec![Ok(double_integral())]);
    let history = HistoryIndex::new(MemoryStore::new());
    let out = generate_unique(&source, Category::MultipleIntegral, &corpus_with(extremum_f()), &history, &GenerationPolicy::default())
      .await
      .unwrap();
    assert_eq!(out.attempts, 1);
    assert_eq!(out.problem, double_integral());
  }

  #[tokio::test]
  async fn corpus_duplicate_is_retried_with_avoid_list() {
    let source = Scripted::new(vec![Ok(extremum_f()), Ok(eigenvalues())]);
    let history = HistoryIndex::new(MemoryStore::new());
    let out = generate_unique(&source, Category::Differential, &corpus_with(extremum_f()), &history, &GenerationPolicy::default())
      .await
      .unwrap();

    assert_eq!(out.attempts, 2);
    let calls = source.calls();
    assert!(calls[0].is_empty());
    assert_eq!(calls[1], vec![extremum_f().title]);
  }

  #[tokio::test]
  async fn history_match_is_rejected() {
    let history = HistoryIndex::new(MemoryStore::new());
    history.add(&double_integral(), "old.md").unwrap();
    let source = Scripted::new(vec![Ok(double_integral()), Ok(eigenvalues())]);

    let out = generate_unique(&source, Category::LinearAlgebra, &[], &history, &GenerationPolicy::default())
      .await
      .unwrap();
    assert_eq!(out.attempts, 2);
    assert_eq!(out.problem, eigenvalues());
  }

  #[tokio::test]
  async fn merely_similar_candidate_is_accepted() {
    let source = Scripted::new(vec![Ok(extremum_g())]);
    let history = HistoryIndex::new(MemoryStore::new());
    let out = generate_unique(&source, Category::Differential, &corpus_with(extremum_f()), &history, &GenerationPolicy::default())
      .await
      .unwrap();
    assert_eq!(out.attempts, 1);
  }

  #[tokio::test]
  async fn exhaustion_reports_attempts_and_last_reason() {
    let source = Scripted::new(vec![
      Err(GenerationError::Model("timeout".into())),
      Ok(Problem::new("", "body", Category::Series, Difficulty::Easy)),
      Ok(extremum_f()),
    ]);
    let history = HistoryIndex::new(MemoryStore::new());
    let err = generate_unique(&source, Category::Differential, &corpus_with(extremum_f()), &history, &GenerationPolicy::default())
      .await
      .unwrap_err();

    match err {
      GenerationError::Exhausted { attempts, last_rejection } => {
        assert_eq!(attempts, 3);
        assert!(last_rejection.starts_with("duplicate of"), "{last_rejection}");
      }
      other => panic!("unexpected error: {other}"),
    }
    assert_eq!(source.calls().len(), 3);
  }

  #[tokio::test]
  async fn zero_attempts_never_calls_the_source() {
    let source = Scripted::new(vec![Ok(double_integral())]);
    let history = HistoryIndex::new(MemoryStore::new());
    let policy = GenerationPolicy { max_attempts: 0, ..Default::default() };
    let err = generate_unique(&source, Category::Series, &[], &history, &policy).await.unwrap_err();
    assert!(matches!(err, GenerationError::Exhausted { attempts: 0, .. }));
    assert!(source.calls().is_empty());
  }

  #[test]
  fn screen_reports_invalid_problem() {
    let history = HistoryIndex::new(MemoryStore::new());
    let s = screen(
      &Problem::new("title", " ", Category::Series, Difficulty::Easy),
      &[],
      &history,
      &GenerationPolicy::default(),
    );
    assert!(matches!(s.rejection, Some(Rejection::Invalid { .. })));
  }

  #[test]
  fn resolve_category_by_id_name_or_random() {
    assert_eq!(resolve_category(Some("series")).unwrap(), Category::Series);
    assert_eq!(resolve_category(Some("线性代数")).unwrap(), Category::LinearAlgebra);
    assert!(Category::ALL.contains(&resolve_category(None).unwrap()));
    assert!(Category::ALL.contains(&resolve_category(Some("  ")).unwrap()));
    assert!(matches!(resolve_category(Some("topology")), Err(GenerationError::UnknownCategory(_))));
  }
}
