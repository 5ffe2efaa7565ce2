//! Domain models: problem categories, difficulty, problems and corpus entries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of problem categories.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  #[serde(alias = "微分学")]
  Differential,
  #[serde(alias = "积分学")]
  Integral,
  #[serde(alias = "微分方程")]
  DifferentialEquation,
  #[serde(alias = "多元微分")]
  MultivariableDifferential,
  #[serde(alias = "多重积分")]
  MultipleIntegral,
  #[serde(alias = "级数")]
  Series,
  #[serde(alias = "线性代数")]
  LinearAlgebra,
  #[serde(alias = "概率统计")]
  Probability,
}

impl Category {
  pub const ALL: [Category; 8] = [
    Category::Differential,
    Category::Integral,
    Category::DifferentialEquation,
    Category::MultivariableDifferential,
    Category::MultipleIntegral,
    Category::Series,
    Category::LinearAlgebra,
    Category::Probability,
  ];

  pub fn id(self) -> &'static str {
    match self {
      Category::Differential => "differential",
      Category::Integral => "integral",
      Category::DifferentialEquation => "differential_equation",
      Category::MultivariableDifferential => "multivariable_differential",
      Category::MultipleIntegral => "multiple_integral",
      Category::Series => "series",
      Category::LinearAlgebra => "linear_algebra",
      Category::Probability => "probability",
    }
  }

  pub fn name_zh(self) -> &'static str {
    match self {
      Category::Differential => "微分学",
      Category::Integral => "积分学",
      Category::DifferentialEquation => "微分方程",
      Category::MultivariableDifferential => "多元微分",
      Category::MultipleIntegral => "多重积分",
      Category::Series => "级数",
      Category::LinearAlgebra => "线性代数",
      Category::Probability => "概率统计",
    }
  }

  pub fn name_en(self) -> &'static str {
    match self {
      Category::Differential => "Differential Calculus",
      Category::Integral => "Integral Calculus",
      Category::DifferentialEquation => "Differential Equations",
      Category::MultivariableDifferential => "Multivariable Differential",
      Category::MultipleIntegral => "Multiple Integrals",
      Category::Series => "Series",
      Category::LinearAlgebra => "Linear Algebra",
      Category::Probability => "Probability and Statistics",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Category::Differential => "导数、微分、切线、函数单调性、极值等",
      Category::Integral => "不定积分、定积分、积分应用等",
      Category::DifferentialEquation => "常微分方程、偏微分方程等",
      Category::MultivariableDifferential => "偏导数、全微分、梯度、方向导数等",
      Category::MultipleIntegral => "二重积分、三重积分、曲线积分、曲面积分等",
      Category::Series => "数项级数、幂级数、傅里叶级数等",
      Category::LinearAlgebra => "矩阵、行列式、向量空间、特征值等",
      Category::Probability => "概率、随机变量、分布、统计推断等",
    }
  }

  /// Folder slug under which problems of this category are filed.
  pub fn folder(self) -> &'static str {
    match self {
      Category::Differential => "differential",
      Category::Integral => "integral",
      Category::DifferentialEquation => "differential-equations",
      Category::MultivariableDifferential => "multivariable-differential",
      Category::MultipleIntegral => "multiple-integrals",
      Category::Series => "series",
      Category::LinearAlgebra => "linear-algebra",
      Category::Probability => "probability-statistics",
    }
  }

  /// Category by snake_case id or Chinese name.
  pub fn from_label(label: &str) -> Option<Category> {
    Category::ALL.into_iter().find(|c| c.id() == label || c.name_zh() == label)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  #[serde(alias = "简单")]
  Easy,
  #[serde(alias = "中等")]
  Medium,
  #[serde(alias = "困难")]
  Hard,
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Medium }
}

/// A candidate or stored problem.
///
/// Title and description default to empty when absent so that scoring can
/// degrade to zero instead of rejecting the payload; acceptance goes through
/// [`Problem::validate`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Problem {
  #[serde(default)] pub title: String,
  #[serde(default)] pub description: String,
  pub category: Category,
  #[serde(default)] pub difficulty: Difficulty,
  /// Free-form labels; not used for scoring.
  #[serde(default, skip_serializing_if = "Vec::is_empty")] pub tags: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")] pub hints: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProblemError {
  #[error("problem title is empty")]
  EmptyTitle,
  #[error("problem description is empty")]
  EmptyDescription,
}

impl Problem {
  pub fn new(
    title: impl Into<String>,
    description: impl Into<String>,
    category: Category,
    difficulty: Difficulty,
  ) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
      category,
      difficulty,
      tags: Vec::new(),
      hints: Vec::new(),
    }
  }

  pub fn validate(&self) -> Result<(), ProblemError> {
    if self.title.trim().is_empty() {
      return Err(ProblemError::EmptyTitle);
    }
    if self.description.trim().is_empty() {
      return Err(ProblemError::EmptyDescription);
    }
    Ok(())
  }

  /// Title and description joined by a space; the text scanned for concepts.
  pub fn full_text(&self) -> String {
    format!("{} {}", self.title, self.description)
  }
}

/// A stored problem plus the path it was filed under.
/// The path is a back-reference only; nothing here checks it exists.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CorpusEntry {
  pub path: String,
  #[serde(flatten)]
  pub problem: Problem,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn category_accepts_id_and_chinese_name() {
    let by_id: Category = serde_json::from_str("\"linear_algebra\"").unwrap();
    let by_name: Category = serde_json::from_str("\"线性代数\"").unwrap();
    assert_eq!(by_id, Category::LinearAlgebra);
    assert_eq!(by_name, Category::LinearAlgebra);
    assert_eq!(serde_json::to_string(&by_name).unwrap(), "\"linear_algebra\"");
  }

  #[test]
  fn every_category_is_found_by_id_or_name() {
    for c in Category::ALL {
      assert_eq!(Category::from_label(c.id()), Some(c));
      assert_eq!(Category::from_label(c.name_zh()), Some(c));
    }
    assert_eq!(Category::from_label("topology"), None);
  }

  #[test]
  fn difficulty_accepts_chinese_labels() {
    let d: Difficulty = serde_json::from_str("\"困难\"").unwrap();
    assert_eq!(d, Difficulty::Hard);
  }

  #[test]
  fn problem_without_text_deserializes_but_fails_validation() {
    let p: Problem = serde_json::from_str(r#"{"category":"series"}"#).unwrap();
    assert_eq!(p.title, "");
    assert_eq!(p.difficulty, Difficulty::Medium);
    assert_eq!(p.validate(), Err(ProblemError::EmptyTitle));

    let p = Problem::new("级数收敛", "   ", Category::Series, Difficulty::Easy);
    assert_eq!(p.validate(), Err(ProblemError::EmptyDescription));
  }

  #[test]
  fn corpus_entry_flattens_problem_fields() {
    let e: CorpusEntry = serde_json::from_str(
      r#"{"path":"problems/series/a.md","title":"t","description":"d","category":"series","difficulty":"easy"}"#,
    ).unwrap();
    assert_eq!(e.path, "problems/series/a.md");
    assert_eq!(e.problem.category, Category::Series);
    assert!(e.problem.tags.is_empty());
  }

  #[test]
  fn tags_and_hints_are_optional_and_omitted_when_empty() {
    let p: Problem = serde_json::from_str(
      r#"{"title":"t","description":"d","category":"series","tags":["收敛"],"hints":["比较判别法"]}"#,
    ).unwrap();
    assert_eq!(p.tags, vec!["收敛"]);
    assert_eq!(p.hints, vec!["比较判别法"]);

    let bare = serde_json::to_value(Problem::new("t", "d", Category::Series, Difficulty::Easy)).unwrap();
    assert!(bare.get("tags").is_none());
    assert!(bare.get("hints").is_none());
  }
}
