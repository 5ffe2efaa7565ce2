//! Minimal OpenAI-compatible client used as a problem source.
//!
//! We only call chat.completions in JSON mode. Calls are instrumented and log the
//! model name, latency and response size, never contents beyond a short preview.
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Category, Difficulty, Problem};
use crate::generation::{GenerationError, ProblemSource};
use crate::util::{extract_json_object, fill_template, trunc_for_log};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
}

/// The fields we read from a generated problem. `category` in the reply is
/// ignored; the requested category wins.
#[derive(Deserialize)]
struct GeneratedProblem {
  #[serde(default)]
  title: String,
  #[serde(default)]
  description: String,
  #[serde(default)]
  difficulty: Option<Difficulty>,
  #[serde(default)]
  tags: Vec<String>,
  #[serde(default)]
  hints: Vec<String>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
      Ok(c) => c,
      Err(e) => {
        error!(target: "generation", error = %e, "Failed to build HTTP client; OpenAI disabled");
        return None;
      }
    };

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model, prompts })
  }

  /// JSON-object chat completion; returns the raw message content.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json(&self, system: &str, user: &str, temperature: f32) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "mathdaily-dedup/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| GenerationError::Model(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(GenerationError::Model(format!("OpenAI HTTP {}: {}", status, trunc_for_log(&msg, 300))));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GenerationError::Model(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "generation", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default())
  }

  fn user_prompt(&self, category: Category, avoid: &[String]) -> String {
    let avoid_text = if avoid.is_empty() {
      String::new()
    } else {
      let titles = avoid.iter().map(|t| format!("- {}", t)).collect::<Vec<_>>().join("\n");
      fill_template(&self.prompts.avoid_template, &[("titles", &titles)])
    };
    fill_template(
      &self.prompts.problem_user_template,
      &[
        ("category", category.name_zh()),
        ("category_en", category.name_en()),
        ("category_description", category.description()),
        ("avoid", &avoid_text),
      ],
    )
  }
}

#[async_trait]
impl ProblemSource for OpenAI {
  #[instrument(level = "info", skip(self, category, avoid), fields(category = category.id(), avoid = avoid.len()))]
  async fn generate(&self, category: Category, avoid: &[String]) -> Result<Problem, GenerationError> {
    let user = self.user_prompt(category, avoid);
    let start = Instant::now();
    let result = self.chat_json(&self.prompts.problem_system, &user, 0.9).await;
    let elapsed = start.elapsed();

    let raw = match result {
      Ok(raw) => {
        info!(target: "generation", ?elapsed, bytes = raw.len(), "Model response received");
        raw
      }
      Err(e) => {
        error!(target: "generation", ?elapsed, error = %e, "Model call failed during problem generation");
        return Err(e);
      }
    };

    debug!(target: "generation", preview = %trunc_for_log(&raw, 120), "Parsing generated problem");
    parse_generated_problem(&raw, category)
  }
}

/// Decode a model reply into a [`Problem`] of `category`.
///
/// Tolerates prose or a fenced block around the object, and full-width commas
/// and colons used as JSON punctuation.
pub fn parse_generated_problem(raw: &str, category: Category) -> Result<Problem, GenerationError> {
  let json = extract_json_object(raw)
    .ok_or_else(|| GenerationError::InvalidResponse("no JSON object in model reply".into()))?;

  let generated = match serde_json::from_str::<GeneratedProblem>(json) {
    Ok(g) => g,
    Err(first) => {
      let relaxed = json.replace('，', ",").replace('：', ":");
      serde_json::from_str::<GeneratedProblem>(&relaxed)
        .map_err(|_| GenerationError::InvalidResponse(format!("JSON parse error: {}", first)))?
    }
  };

  let mut problem = Problem::new(
    generated.title.trim(),
    generated.description.trim(),
    category,
    generated.difficulty.unwrap_or_default(),
  );
  problem.tags = non_blank(generated.tags);
  problem.hints = non_blank(generated.hints);
  problem.validate().map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
  Ok(problem)
}

fn non_blank(items: Vec<String>) -> Vec<String> {
  items.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> OpenAI {
    OpenAI {
      client: reqwest::Client::new(),
      api_key: "test".into(),
      base_url: DEFAULT_BASE_URL.into(),
      model: DEFAULT_MODEL.into(),
      prompts: Prompts::default(),
    }
  }

  #[test]
  fn parses_plain_json_reply() {
    let raw = r#"{"title":"求极限","description":"计算 x 趋于 0 时 sin x / x 的极限","category":"微分学","difficulty":"困难","tags":["极限"]}"#;
    let p = parse_generated_problem(raw, Category::Differential).unwrap();
    assert_eq!(p.title, "求极限");
    assert_eq!(p.difficulty, Difficulty::Hard);
    assert_eq!(p.category, Category::Differential);
    assert_eq!(p.tags, vec!["极限"]);
    assert!(p.hints.is_empty());
  }

  #[test]
  fn keeps_non_blank_hints() {
    let raw = r#"{"title":"求秩","description":"求矩阵 A 的秩","hints":[" 初等行变换 ", ""]}"#;
    let p = parse_generated_problem(raw, Category::LinearAlgebra).unwrap();
    assert_eq!(p.hints, vec!["初等行变换"]);
  }

  #[test]
  fn parses_fenced_reply_and_overrides_category() {
    let raw = "```json\n{\"title\": \" 级数收敛 \", \"description\": \"判断级数的敛散性\", \"category\": \"微分学\"}\n```";
    let p = parse_generated_problem(raw, Category::Series).unwrap();
    assert_eq!(p.title, "级数收敛");
    assert_eq!(p.category, Category::Series);
    assert_eq!(p.difficulty, Difficulty::Medium);
  }

  #[test]
  fn tolerates_full_width_json_punctuation() {
    let raw = "{\"title\"：\"矩阵的秩\"，\"description\"：\"求矩阵 A 的秩\"}";
    let p = parse_generated_problem(raw, Category::LinearAlgebra).unwrap();
    assert_eq!(p.title, "矩阵的秩");
  }

  #[test]
  fn rejects_missing_object_or_fields() {
    assert!(matches!(
      parse_generated_problem("I cannot help with that.", Category::Series),
      Err(GenerationError::InvalidResponse(_))
    ));
    assert!(matches!(
      parse_generated_problem(r#"{"title": "only a title"}"#, Category::Series),
      Err(GenerationError::InvalidResponse(_))
    ));
  }

  #[test]
  fn prompt_mentions_category_and_avoid_list() {
    let c = client();
    let plain = c.user_prompt(Category::Probability, &[]);
    assert!(plain.contains("概率统计"));
    assert!(plain.contains("Probability and Statistics"));
    assert!(!plain.contains("{avoid}"));
    assert!(!plain.contains("请避免"));

    let steered = c.user_prompt(Category::Probability, &["求正态分布的期望".to_string()]);
    assert!(steered.contains("- 求正态分布的期望"));
  }

  #[test]
  fn openai_error_body_is_unwrapped() {
    assert_eq!(
      extract_openai_error(r#"{"error":{"message":"bad key","type":"auth"}}"#),
      Some("bad key".to_string())
    );
    assert_eq!(extract_openai_error("plain"), None);
  }
}
