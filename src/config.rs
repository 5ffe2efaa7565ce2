//! Service configuration loaded from TOML, with environment overrides.
//!
//! See `ServiceConfig` for the expected schema. Every key is optional.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

use crate::generation::{GenerationPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::history::{DEFAULT_HISTORY_THRESHOLD, DEFAULT_MAX_RECORDS};
use crate::scanner::DEFAULT_DUPLICATE_THRESHOLD;

const DEFAULT_HISTORY_PATH: &str = "data/problem-history.json";

#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
pub struct ServiceConfig {
  #[serde(default)]
  pub dedup: DedupConfig,
  #[serde(default)]
  pub history: HistoryConfig,
  #[serde(default)]
  pub generation: GenerationConfig,
  #[serde(default)]
  pub prompts: Prompts,
  /// Optional JSON array of corpus entries to preload.
  #[serde(default)]
  pub corpus_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DedupConfig {
  pub duplicate_threshold: f64,
  pub history_threshold: f64,
}

impl Default for DedupConfig {
  fn default() -> Self {
    Self { duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD, history_threshold: DEFAULT_HISTORY_THRESHOLD }
  }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
  /// `:memory:` keeps history in process memory only.
  pub path: String,
  pub max_records: usize,
}

impl Default for HistoryConfig {
  fn default() -> Self {
    Self { path: DEFAULT_HISTORY_PATH.into(), max_records: DEFAULT_MAX_RECORDS }
  }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
  pub max_attempts: u32,
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self { max_attempts: DEFAULT_MAX_ATTEMPTS }
  }
}

/// Prompts used by the OpenAI client.
/// Placeholders: `{category}`, `{category_en}`, `{category_description}`, `{avoid}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
  pub problem_system: String,
  pub problem_user_template: String,
  /// Inserted as `{avoid}` when there are titles to steer away from.
  pub avoid_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      problem_system: "You write university-level mathematics problems in Chinese. Respond ONLY with a strict JSON object.".into(),
      problem_user_template: "请生成一道{category}({category_en})的高等数学题目，范围：{category_description}。\n题目应参考考研数学真题的风格和难度，条件完整，解答方向明确。\n返回 JSON：{\"title\": string, \"description\": string, \"difficulty\": \"简单\" | \"中等\" | \"困难\", \"tags\": [string], \"hints\": [string]}。数学公式用文字描述。\n{avoid}".into(),
      avoid_template: "请避免与以下已有题目重复或相似：\n{titles}".into(),
    }
  }
}

impl ServiceConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(s)
  }

  pub fn policy(&self) -> GenerationPolicy {
    GenerationPolicy {
      max_attempts: self.generation.max_attempts,
      duplicate_threshold: self.dedup.duplicate_threshold,
      history_threshold: self.dedup.history_threshold,
    }
  }

  /// Apply `HISTORY_PATH` and `CORPUS_PATH` on top of the file values.
  pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(path) = lookup("HISTORY_PATH").filter(|p| !p.is_empty()) {
      self.history.path = path;
    }
    if let Some(path) = lookup("CORPUS_PATH").filter(|p| !p.is_empty()) {
      self.corpus_path = Some(PathBuf::from(path));
    }
  }
}

/// Load `ServiceConfig` from MATHDAILY_CONFIG_PATH, falling back to defaults on
/// any read or parse error, then apply environment overrides.
pub fn load_service_config_from_env() -> ServiceConfig {
  let mut cfg = match std::env::var("MATHDAILY_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match ServiceConfig::from_toml_str(&s) {
        Ok(cfg) => {
          info!(target: "mathdaily", %path, "Loaded service config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "mathdaily", %path, error = %e, "Failed to parse TOML config; using defaults");
          ServiceConfig::default()
        }
      },
      Err(e) => {
        error!(target: "mathdaily", %path, error = %e, "Failed to read TOML config file; using defaults");
        ServiceConfig::default()
      }
    },
    Err(_) => ServiceConfig::default(),
  };
  cfg.apply_overrides(|key| std::env::var(key).ok());
  cfg
}
