//! Weighted problem similarity: title and description word overlap plus
//! concept-set Jaccard.

use serde::Serialize;

use crate::concepts::{extract_concepts, jaccard};
use crate::domain::Problem;
use crate::text::text_similarity;

pub const TITLE_WEIGHT: f64 = 0.4;
pub const DESCRIPTION_WEIGHT: f64 = 0.4;
pub const CONCEPT_WEIGHT: f64 = 0.2;

/// Overall score strictly above this is a duplicate.
pub const DUPLICATE_THRESHOLD: f64 = 0.7;
/// Overall score strictly above this is highly similar.
pub const HIGH_SIMILARITY_THRESHOLD: f64 = 0.5;

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct SimilarityResult {
  pub overall: f64,
  pub title_similarity: f64,
  pub description_similarity: f64,
  pub concept_similarity: f64,
  /// Informational only; does not take part in classification.
  pub same_category: bool,
  pub is_duplicate: bool,
  pub is_highly_similar: bool,
}

pub fn score(a: &Problem, b: &Problem) -> SimilarityResult {
  let title_similarity = text_similarity(&a.title, &b.title);
  let description_similarity = text_similarity(&a.description, &b.description);
  let concept_similarity = jaccard(
    &extract_concepts(&a.full_text()),
    &extract_concepts(&b.full_text()),
  );

  let overall = title_similarity * TITLE_WEIGHT
    + description_similarity * DESCRIPTION_WEIGHT
    + concept_similarity * CONCEPT_WEIGHT;

  SimilarityResult {
    overall,
    title_similarity,
    description_similarity,
    concept_similarity,
    same_category: a.category == b.category,
    is_duplicate: overall > DUPLICATE_THRESHOLD,
    is_highly_similar: overall > HIGH_SIMILARITY_THRESHOLD,
  }
}


#[cfg(test)]
mod tests {
  use super::fixtures::*;
  use super::*;
  use crate::domain::{Category, Difficulty};

  fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

  #[test]
  fn self_comparison_scores_one() {
    for p in [extremum_f(), double_integral(), eigenvalues()] {
      let r = score(&p, &p);
      assert!(close(r.overall, 1.0), "{}: {}", p.title, r.overall);
      assert!(r.is_duplicate && r.is_highly_similar && r.same_category);
    }
  }

  #[test]
  fn concept_free_problem_self_scores_point_eight() {
    let p = Problem::new("Plain words", "Nothing mathematical here", Category::Series, Difficulty::Easy);
    let r = score(&p, &p);
    assert!(close(r.overall, 0.8));
    assert!(r.is_duplicate);
  }

  #[test]
  fn score_is_symmetric() {
    let all = [extremum_f(), extremum_g(), double_integral(), eigenvalues()];
    for a in &all {
      for b in &all {
        assert_eq!(score(a, b).overall, score(b, a).overall);
      }
    }
  }

  #[test]
  fn near_duplicate_extremum_problems_are_highly_similar() {
    let r = score(&extremum_f(), &extremum_g());
    assert!(close(r.title_similarity, 0.6));
    assert!(close(r.description_similarity, 0.6));
    assert!(close(r.concept_similarity, 1.0));
    assert!(close(r.overall, 0.68));
    assert!(r.is_highly_similar);
    assert!(!r.is_duplicate);
    assert!(r.same_category);
  }

  #[test]
  fn shared_title_skeleton_scores_one_on_title() {
    let a = Problem::new("求函数 f(x) 的极值点", "已知 f(x) 可导，求极值", Category::Differential, Difficulty::Easy);
    let b = Problem::new("计算函数 f(x) 的极值", "设 f(x) 可导，求极值", Category::Differential, Difficulty::Easy);
    let r = score(&a, &b);
    assert!(close(r.title_similarity, 1.0));
    assert!(r.is_highly_similar);
  }

  #[test]
  fn disjoint_problems_score_near_zero() {
    let r = score(&extremum_f(), &double_integral());
    assert!(close(r.overall, 0.0));
    assert!(!r.is_duplicate && !r.is_highly_similar);
    assert!(!r.same_category);
  }

  #[test]
  fn empty_problem_scores_zero() {
    let empty = Problem::new("", "", Category::Series, Difficulty::Easy);
    let r = score(&empty, &extremum_f());
    assert_eq!(r.overall, 0.0);
    assert_eq!(r.title_similarity, 0.0);
    assert_eq!(r.description_similarity, 0.0);
    assert_eq!(r.concept_similarity, 0.0);
    assert_eq!(score(&empty, &empty).overall, 0.0);
  }

  #[test]
  fn scores_stay_in_unit_range_and_duplicate_implies_high() {
    let all = [
      extremum_f(),
      extremum_g(),
      double_integral(),
      eigenvalues(),
      Problem::new("", "x", Category::Series, Difficulty::Hard),
    ];
    for a in &all {
      for b in &all {
        let r = score(a, b);
        for v in [r.overall, r.title_similarity, r.description_similarity, r.concept_similarity] {
          assert!((0.0..=1.0 + 1e-12).contains(&v));
        }
        assert!(!r.is_duplicate || r.is_highly_similar);
      }
    }
  }
}
