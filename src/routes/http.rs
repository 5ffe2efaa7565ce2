//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::{error, info, instrument};

use crate::generation::GenerationError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for ServiceError {
  fn into_response(self) -> Response {
    let status = match &self {
      ServiceError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ServiceError::UnknownCategory(_) => StatusCode::BAD_REQUEST,
      ServiceError::Rejected(_) => StatusCode::CONFLICT,
      ServiceError::GenerationDisabled => StatusCode::SERVICE_UNAVAILABLE,
      ServiceError::Generation(GenerationError::Exhausted { .. }) => StatusCode::CONFLICT,
      ServiceError::Generation(_) => StatusCode::BAD_GATEWAY,
      ServiceError::History(_) | ServiceError::Corpus(_) | ServiceError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      error!(target: "mathdaily", %status, error = %self, "Request failed");
    }
    let body = match &self {
      ServiceError::Rejected(rejection) => json!({ "error": self.to_string(), "rejection": rejection }),
      _ => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_categories() -> impl IntoResponse { Json(categories()) }

#[instrument(level = "info", skip(body), fields(a_len = body.a.title.len(), b_len = body.b.title.len()))]
pub async fn http_similarity(Json(body): Json<SimilarityIn>) -> impl IntoResponse {
  let result = score_pair(&body.a, &body.b);
  info!(target: "dedup", overall = result.overall, is_duplicate = result.is_duplicate, "HTTP similarity scored");
  Json(result)
}

#[instrument(level = "info", skip(state, body), fields(threshold = ?body.threshold))]
pub async fn http_check_duplicates(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> impl IntoResponse {
  let out = check_duplicates(&state, &body.problem, body.threshold).await;
  info!(target: "dedup", is_duplicate = out.is_duplicate, highest = out.highest_similarity, "HTTP duplicate check");
  Json(out)
}

#[instrument(level = "info", skip(state))]
pub async fn http_uniqueness_report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(uniqueness(&state).await)
}

#[instrument(level = "info", skip(state), fields(category = %q.category, limit = ?q.limit))]
pub async fn http_corpus(
  State(state): State<Arc<AppState>>,
  Query(q): Query<CorpusQuery>,
) -> Result<Json<Vec<CorpusEntryOut>>, ServiceError> {
  Ok(Json(list_category(&state, &q.category, q.limit).await?))
}

#[instrument(level = "info", skip(state, body), fields(title_len = body.problem.title.len(), category = body.problem.category.id()))]
pub async fn http_submit_problem(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SubmitIn>,
) -> Result<(StatusCode, Json<AcceptedOut>), ServiceError> {
  let out = accept_problem(&state, body.problem, body.file_path).await?;
  info!(target: "mathdaily", id = %out.id, "HTTP problem accepted");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_generate(
  State(state): State<Arc<AppState>>,
  body: Option<Json<GenerateIn>>,
) -> Result<(StatusCode, Json<GeneratedOut>), ServiceError> {
  let Json(body) = body.unwrap_or_default();
  let out = generate_problem(&state, body.category.as_deref()).await?;
  info!(target: "generation", id = %out.accepted.id, attempts = out.attempts, "HTTP problem generated");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_history_list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(history_records(&state))
}

#[instrument(level = "info", skip(state, body), fields(threshold = ?body.threshold))]
pub async fn http_history_check(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> impl IntoResponse {
  let out = check_history(&state, &body.problem, body.threshold);
  info!(target: "history", has_similar = out.has_similar, highest = out.highest_similarity, "HTTP history check");
  Json(out)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_history_cleanup(
  State(state): State<Arc<AppState>>,
  body: Option<Json<CleanupIn>>,
) -> Result<Json<CleanupOut>, ServiceError> {
  let Json(body) = body.unwrap_or_default();
  Ok(Json(cleanup_history(&state, body.max_records).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_history_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(history_stats(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_history_export(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(history_export(&state))
}
