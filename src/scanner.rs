//! Corpus-wide duplicate checks and uniqueness reports.
//!
//! The corpus arrives already parsed; this module never reads files.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::concepts::{extract_concepts, ConceptSet};
use crate::domain::{Category, CorpusEntry, Problem};
use crate::similarity::{score, SimilarityResult, DUPLICATE_THRESHOLD};

pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = DUPLICATE_THRESHOLD;

#[derive(Debug, Serialize)]
pub struct CorpusMatch<'a> {
    pub entry: &'a CorpusEntry,
    pub similarity: SimilarityResult,
}

#[derive(Debug, Serialize)]
pub struct DuplicateCheck<'a> {
    pub is_duplicate: bool,
    pub highest_similarity: f64,
    pub duplicates: Vec<CorpusMatch<'a>>,
    pub similar_problems: Vec<CorpusMatch<'a>>,
}

impl DuplicateCheck<'_> {
    /// Titles of every duplicate and similar problem, most similar first.
    pub fn conflicting_titles(&self) -> Vec<String> {
        self.duplicates
            .iter()
            .chain(&self.similar_problems)
            .map(|m| m.entry.problem.title.clone())
            .collect()
    }
}

/// Score `candidate` against every corpus entry.
///
/// An entry is a duplicate when the scorer says so or its overall score reaches
/// `threshold`; otherwise it is similar when the scorer rates it highly similar.
#[instrument(level = "debug", skip(candidate, corpus), fields(corpus = corpus.len()))]
pub fn check_for_duplicates<'a>(
    candidate: &Problem,
    corpus: &'a [CorpusEntry],
    threshold: f64,
) -> DuplicateCheck<'a> {
    let mut highest_similarity = 0.0_f64;
    let mut duplicates = Vec::new();
    let mut similar_problems = Vec::new();

    for entry in corpus {
        let similarity = score(candidate, &entry.problem);
        highest_similarity = highest_similarity.max(similarity.overall);

        if similarity.is_duplicate || similarity.overall >= threshold {
            duplicates.push(CorpusMatch { entry, similarity });
        } else if similarity.is_highly_similar {
            similar_problems.push(CorpusMatch { entry, similarity });
        }
    }

    sort_by_overall(&mut duplicates);
    sort_by_overall(&mut similar_problems);

    debug!(
        target: "dedup",
        duplicates = duplicates.len(),
        similar = similar_problems.len(),
        highest = highest_similarity,
        "Duplicate check finished"
    );

    DuplicateCheck {
        is_duplicate: !duplicates.is_empty(),
        highest_similarity,
        duplicates,
        similar_problems,
    }
}

fn sort_by_overall(matches: &mut [CorpusMatch<'_>]) {
    matches.sort_by(|a, b| b.similarity.overall.total_cmp(&a.similarity.overall));
}

#[derive(Debug, Serialize)]
pub struct PairMatch<'a> {
    pub first: &'a CorpusEntry,
    pub second: &'a CorpusEntry,
    pub similarity: SimilarityResult,
}

#[derive(Debug, Serialize)]
pub struct UniquenessReport<'a> {
    pub total_problems: usize,
    pub duplicate_pairs: Vec<PairMatch<'a>>,
    pub high_similarity_pairs: Vec<PairMatch<'a>>,
    pub category_distribution: BTreeMap<Category, usize>,
    /// 1 − duplicate pairs / all pairs; 1 when there are no pairs.
    pub uniqueness_score: f64,
}

/// Compare every unordered pair of the corpus once.
#[instrument(level = "info", skip(corpus), fields(corpus = corpus.len()))]
pub fn uniqueness_report(corpus: &[CorpusEntry]) -> UniquenessReport<'_> {
    let mut duplicate_pairs = Vec::new();
    let mut high_similarity_pairs = Vec::new();
    let mut category_distribution = BTreeMap::new();

    for (i, first) in corpus.iter().enumerate() {
        for second in &corpus[i + 1..] {
            let similarity = score(&first.problem, &second.problem);
            if similarity.is_duplicate {
                duplicate_pairs.push(PairMatch { first, second, similarity });
            } else if similarity.is_highly_similar {
                high_similarity_pairs.push(PairMatch { first, second, similarity });
            }
        }
        *category_distribution.entry(first.problem.category).or_insert(0) += 1;
    }

    let n = corpus.len();
    let total_pairs = n * n.saturating_sub(1) / 2;
    let uniqueness_score = if total_pairs > 0 {
        1.0 - duplicate_pairs.len() as f64 / total_pairs as f64
    } else {
        1.0
    };

    debug!(target: "dedup", total_pairs, duplicates = duplicate_pairs.len(), uniqueness_score, "Uniqueness report built");

    UniquenessReport {
        total_problems: n,
        duplicate_pairs,
        high_similarity_pairs,
        category_distribution,
        uniqueness_score,
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryEntry<'a> {
    pub entry: &'a CorpusEntry,
    pub concepts: ConceptSet,
}

/// Up to `limit` corpus entries of `category`, with their concepts.
pub fn problems_in_category(corpus: &[CorpusEntry], category: Category, limit: usize) -> Vec<CategoryEntry<'_>> {
    corpus
        .iter()
        .filter(|e| e.problem.category == category)
        .take(limit)
        .map(|entry| CategoryEntry { entry, concepts: extract_concepts(&entry.problem.full_text()) })
        .collect()
}
