//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Core results that borrow the corpus are copied into owned DTOs here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::concepts::ConceptSet;
use crate::domain::{Category, CorpusEntry, Difficulty, Problem};
use crate::history::{HistoryCheck, HistoryStatistics};
use crate::scanner::{CategoryEntry, CorpusMatch, DuplicateCheck, PairMatch, UniquenessReport};
use crate::similarity::SimilarityResult;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Score {
        a: Problem,
        b: Problem,
    },
    CheckDuplicates {
        problem: Problem,
        #[serde(default)]
        threshold: Option<f64>,
    },
    CheckHistory {
        problem: Problem,
        #[serde(default)]
        threshold: Option<f64>,
    },
    UniquenessReport,
    HistoryStats,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Similarity {
        result: SimilarityResult,
    },
    DuplicateCheck {
        result: DuplicateCheckOut,
    },
    HistoryCheck {
        result: HistoryCheck,
    },
    UniquenessReport {
        report: UniquenessReportOut,
    },
    HistoryStats {
        statistics: HistoryStatistics,
    },
    Error {
        message: String,
    },
}

//
// Shared result DTOs
//

#[derive(Debug, Serialize)]
pub struct CorpusMatchOut {
    pub path: String,
    pub title: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub similarity: SimilarityResult,
}

impl From<&CorpusMatch<'_>> for CorpusMatchOut {
    fn from(m: &CorpusMatch<'_>) -> Self {
        Self {
            path: m.entry.path.clone(),
            title: m.entry.problem.title.clone(),
            category: m.entry.problem.category,
            difficulty: m.entry.problem.difficulty,
            similarity: m.similarity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DuplicateCheckOut {
    pub is_duplicate: bool,
    pub highest_similarity: f64,
    pub duplicates: Vec<CorpusMatchOut>,
    pub similar_problems: Vec<CorpusMatchOut>,
}

impl From<&DuplicateCheck<'_>> for DuplicateCheckOut {
    fn from(c: &DuplicateCheck<'_>) -> Self {
        Self {
            is_duplicate: c.is_duplicate,
            highest_similarity: c.highest_similarity,
            duplicates: c.duplicates.iter().map(Into::into).collect(),
            similar_problems: c.similar_problems.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryRef {
    pub path: String,
    pub title: String,
}

impl From<&CorpusEntry> for EntryRef {
    fn from(e: &CorpusEntry) -> Self {
        Self { path: e.path.clone(), title: e.problem.title.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct PairOut {
    pub first: EntryRef,
    pub second: EntryRef,
    pub similarity: SimilarityResult,
}

impl From<&PairMatch<'_>> for PairOut {
    fn from(p: &PairMatch<'_>) -> Self {
        Self { first: p.first.into(), second: p.second.into(), similarity: p.similarity }
    }
}

#[derive(Debug, Serialize)]
pub struct UniquenessReportOut {
    pub total_problems: usize,
    pub duplicate_pairs: Vec<PairOut>,
    pub high_similarity_pairs: Vec<PairOut>,
    pub category_distribution: BTreeMap<Category, usize>,
    pub uniqueness_score: f64,
}

impl From<&UniquenessReport<'_>> for UniquenessReportOut {
    fn from(r: &UniquenessReport<'_>) -> Self {
        Self {
            total_problems: r.total_problems,
            duplicate_pairs: r.duplicate_pairs.iter().map(Into::into).collect(),
            high_similarity_pairs: r.high_similarity_pairs.iter().map(Into::into).collect(),
            category_distribution: r.category_distribution.clone(),
            uniqueness_score: r.uniqueness_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CorpusEntryOut {
    pub path: String,
    #[serde(flatten)]
    pub problem: Problem,
    pub concepts: ConceptSet,
}

impl From<&CategoryEntry<'_>> for CorpusEntryOut {
    fn from(c: &CategoryEntry<'_>) -> Self {
        Self { path: c.entry.path.clone(), problem: c.entry.problem.clone(), concepts: c.concepts.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryOut {
    pub id: &'static str,
    pub name: &'static str,
    pub name_en: &'static str,
    pub description: &'static str,
    pub folder: &'static str,
}

impl From<Category> for CategoryOut {
    fn from(c: Category) -> Self {
        Self {
            id: c.id(),
            name: c.name_zh(),
            name_en: c.name_en(),
            description: c.description(),
            folder: c.folder(),
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct SimilarityIn {
    pub a: Problem,
    pub b: Problem,
}

#[derive(Debug, Deserialize)]
pub struct CheckIn {
    pub problem: Problem,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CorpusQuery {
    pub category: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    #[serde(flatten)]
    pub problem: Problem,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedOut {
    pub id: String,
    pub file_path: String,
    pub problem: Problem,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedOut {
    #[serde(flatten)]
    pub accepted: AcceptedOut,
    pub attempts: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupIn {
    #[serde(default)]
    pub max_records: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CleanupOut {
    pub removed: usize,
    pub remaining: usize,
}
