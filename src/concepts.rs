//! Domain keyword lexicons and concept extraction.
//!
//! Matching is a plain substring test on the lower-cased text, with no word
//! boundaries: `"sin"` also matches inside `"using"`. Changing that would change
//! which problems are classified as duplicates.
//!
//! Two lexicons exist. [`SCORING_LEXICON`] feeds the similarity scorer and
//! [`FINGERPRINT_LEXICON`] is snapshotted into history records. Stored history
//! files carry keywords from the second list, so the lists are kept apart.

use std::collections::BTreeSet;

pub type ConceptSet = BTreeSet<&'static str>;

pub const SCORING_LEXICON: &[&str] = &[
  // calculus
  "导数", "微分", "积分", "极限", "连续", "切线", "极值", "单调", "凹凸",
  "偏导数", "全微分", "梯度", "方向导数", "重积分", "曲线积分", "曲面积分",
  // algebra
  "矩阵", "行列式", "向量", "特征值", "特征向量", "线性", "齐次", "非齐次",
  "方程组", "二次型", "正定", "负定",
  // series
  "级数", "收敛", "发散", "幂级数", "泰勒", "傅里叶", "比值", "根值",
  // probability and statistics
  "概率", "随机变量", "分布", "期望", "方差", "协方差", "独立", "相关",
  "正态分布", "均匀分布", "泊松分布", "二项分布",
  // differential equations
  "微分方程", "常微分", "偏微分", "齐次方程", "非齐次方程", "通解", "特解",
  // elementary functions
  "sin", "cos", "tan", "ln", "log", "exp", "sqrt",
];

pub const FINGERPRINT_LEXICON: &[&str] = &[
  "函数", "导数", "积分", "极限", "连续", "微分", "偏导", "全微分",
  "矩阵", "行列式", "向量", "特征值", "线性", "齐次", "方程",
  "级数", "收敛", "发散", "幂级数", "泰勒", "傅里叶",
  "概率", "随机", "分布", "期望", "方差", "正态", "均匀",
  "极值", "最值", "单调", "凹凸", "拐点", "渐近",
  "sin", "cos", "tan", "ln", "log", "exp",
];

/// Every lexicon term found anywhere in `text`.
pub fn extract_with(lexicon: &'static [&'static str], text: &str) -> ConceptSet {
  let lowered = text.to_lowercase();
  lexicon
    .iter()
    .copied()
    .filter(|keyword| lowered.contains(keyword))
    .collect()
}

/// Concepts used by the similarity scorer.
pub fn extract_concepts(text: &str) -> ConceptSet {
  extract_with(SCORING_LEXICON, text)
}

/// Keyword snapshot stored in history records.
pub fn extract_keywords(title: &str, description: &str) -> BTreeSet<String> {
  extract_with(FINGERPRINT_LEXICON, &format!("{} {}", title, description))
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// |a ∩ b| / |a ∪ b|, or 0 when either side is empty.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  let common = a.intersection(b).count();
  let union = a.len() + b.len() - common;
  common as f64 / union as f64
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_every_matching_term() {
    let c = extract_concepts("已知函数 f(x)，求该函数的极值点。使用导数方法求解。");
    assert_eq!(c, ConceptSet::from(["导数", "极值"]));
  }

  #[test]
  fn overlapping_terms_all_match() {
    let c = extract_concepts("求解二阶微分方程的通解");
    assert!(c.contains("微分"));
    assert!(c.contains("微分方程"));
    assert!(c.contains("通解"));
  }

  #[test]
  fn matching_is_case_insensitive_substring() {
    let c = extract_concepts("Compute SIN(x) using LN");
    assert!(c.contains("sin"));
    assert!(c.contains("ln"));
    // "using" carries "sin" too; no word boundaries
    assert_eq!(extract_concepts("using"), ConceptSet::from(["sin"]));
  }

  #[test]
  fn empty_text_has_no_concepts() {
    assert!(extract_concepts("").is_empty());
    assert!(extract_keywords("", "").is_empty());
  }

  #[test]
  fn fingerprint_lexicon_differs_from_scoring_lexicon() {
    let k = extract_keywords("求函数的拐点", "");
    assert!(k.contains("函数"));
    assert!(k.contains("拐点"));
    assert!(extract_concepts("求函数的拐点").is_empty());
  }

  #[test]
  fn jaccard_of_sets() {
    let a = ConceptSet::from(["导数", "极值", "单调"]);
    let b = ConceptSet::from(["导数", "极值", "切线", "凹凸"]);
    assert!((jaccard(&a, &b) - 2.0 / 5.0).abs() < 1e-12);
    assert_eq!(jaccard(&a, &a), 1.0);
    assert_eq!(jaccard(&a, &ConceptSet::new()), 0.0);
    assert_eq!(jaccard(&ConceptSet::new(), &ConceptSet::new()), 0.0);
  }
}
