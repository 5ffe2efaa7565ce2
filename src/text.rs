//! Text normalization, word-overlap ratio and fingerprint hashing.
//!
//! Two normal forms live here:
//! - the *word form* used for word overlap: lower-case, only ASCII word
//!   characters and whitespace kept, whitespace runs collapsed to one space;
//! - the *fingerprint form* used for history hashes: lower-case, only
//!   alphanumeric characters (any script) and `_` kept, no whitespace at all.

use std::collections::HashSet;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Lower-case, strip punctuation and collapse whitespace.
///
/// Only `[0-9A-Za-z_]` count as word characters, so CJK runs are removed
/// together with punctuation: `"求函数 f(x) 的极值点"` becomes `"fx"`.
pub fn normalize(text: &str) -> String {
  let kept: String = text
    .to_lowercase()
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
    .collect();
  kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Share of distinct words present in both normalized strings.
///
/// Identical inputs score 1 before any tokenizing happens, even when both are
/// empty; otherwise an empty side scores 0.
pub fn word_overlap_ratio(a: &str, b: &str) -> f64 {
  if a == b {
    return 1.0;
  }
  let words_a: HashSet<&str> = a.split(' ').filter(|w| !w.is_empty()).collect();
  let words_b: HashSet<&str> = b.split(' ').filter(|w| !w.is_empty()).collect();
  if words_a.is_empty() || words_b.is_empty() {
    return 0.0;
  }
  let common = words_a.intersection(&words_b).count();
  let union = words_a.union(&words_b).count();
  common as f64 / union as f64
}

/// Word-overlap similarity of two raw texts. An empty side scores 0.
pub fn text_similarity(a: &str, b: &str) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  word_overlap_ratio(&normalize(a), &normalize(b))
}

pub fn fingerprint_form(text: &str) -> String {
  text
    .to_lowercase()
    .chars()
    .filter(|c| c.is_alphanumeric() || *c == '_')
    .collect()
}

/// 32-bit FNV-1a of the fingerprint form. A text whose fingerprint form is
/// empty (blank or punctuation only) hashes to 0.
pub fn fingerprint_hash(text: &str) -> u32 {
  let form = fingerprint_form(text);
  if form.is_empty() {
    return 0;
  }
  fnv1a32(form.as_bytes())
}

fn fnv1a32(bytes: &[u8]) -> u32 {
  let mut hash = FNV_OFFSET;
  for byte in bytes {
    hash ^= u32::from(*byte);
    hash = hash.wrapping_mul(FNV_PRIME);
  }
  hash
}
