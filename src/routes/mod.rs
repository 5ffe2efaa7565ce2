//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Scoring and corpus
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/categories", get(http::http_categories))
        .route("/api/v1/similarity", post(http::http_similarity))
        .route("/api/v1/duplicates/check", post(http::http_check_duplicates))
        .route("/api/v1/report/uniqueness", get(http::http_uniqueness_report))
        .route("/api/v1/corpus", get(http::http_corpus))
        // Acceptance and generation
        .route("/api/v1/problems", post(http::http_submit_problem))
        .route("/api/v1/generate", post(http::http_generate))
        // History
        .route("/api/v1/history", get(http::http_history_list))
        .route("/api/v1/history/check", post(http::http_history_check))
        .route("/api/v1/history/cleanup", post(http::http_history_cleanup))
        .route("/api/v1/history/stats", get(http::http_history_stats))
        .route("/api/v1/history/export", get(http::http_history_export))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServiceConfig;
    use crate::domain::CorpusEntry;
    use crate::history::MemoryStore;
    use crate::similarity::fixtures::*;

    fn app() -> Router {
        let corpus = vec![
            CorpusEntry { path: "questions/differential/f.md".into(), problem: extremum_f() },
            CorpusEntry { path: "questions/multiple-integrals/d.md".into(), problem: double_integral() },
        ];
        build_router(Arc::new(AppState::ephemeral(ServiceConfig::default(), MemoryStore::new(), corpus)))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_categories() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, body) = call(&app, "GET", "/api/v1/categories", None).await;
        assert_eq!(body.as_array().unwrap().len(), 8);
        assert_eq!(body[0]["id"], "differential");
        assert_eq!(body[0]["name"], "微分学");
    }

    #[tokio::test]
    async fn similarity_endpoint_scores_pair() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/similarity",
            Some(json!({ "a": extremum_f(), "b": extremum_g() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_duplicate"], false);
        assert_eq!(body["is_highly_similar"], true);
    }

    #[tokio::test]
    async fn submit_then_resubmit_conflicts() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/v1/problems", Some(json!(eigenvalues()))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["file_path"].as_str().unwrap().starts_with("questions/linear-algebra/"));

        let (status, body) = call(&app, "POST", "/api/v1/problems", Some(json!(eigenvalues()))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["rejection"]["kind"], "corpus_duplicate");

        let (_, body) = call(&app, "GET", "/api/v1/history", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert!(body[0]["titleHash"].is_number());
    }

    #[tokio::test]
    async fn blank_problem_is_unprocessable() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/problems",
            Some(json!({ "title": " ", "description": "x", "category": "series" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid problem: problem title is empty");
    }

    #[tokio::test]
    async fn duplicate_check_and_report() {
        let app = app();
        let (_, body) = call(&app, "POST", "/api/v1/duplicates/check", Some(json!({ "problem": extremum_g() }))).await;
        assert_eq!(body["is_duplicate"], false);
        assert_eq!(body["similar_problems"].as_array().unwrap().len(), 1);

        let (_, body) = call(
            &app,
            "POST",
            "/api/v1/duplicates/check",
            Some(json!({ "problem": extremum_g(), "threshold": 0.6 })),
        )
        .await;
        assert_eq!(body["is_duplicate"], true);

        let (_, body) = call(&app, "GET", "/api/v1/report/uniqueness", None).await;
        assert_eq!(body["total_problems"], 2);
        assert_eq!(body["uniqueness_score"], 1.0);
    }

    #[tokio::test]
    async fn corpus_listing_by_category() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/corpus?category=differential&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["path"], "questions/differential/f.md");

        let (status, _) = call(&app, "GET", "/api/v1/corpus?category=topology", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generation_without_key_is_unavailable() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/v1/generate", Some(json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn history_endpoints() {
        let app = app();
        call(&app, "POST", "/api/v1/problems", Some(json!(eigenvalues()))).await;

        let (_, body) = call(&app, "POST", "/api/v1/history/check", Some(json!({ "problem": eigenvalues() }))).await;
        assert_eq!(body["has_similar"], true);

        let (_, body) = call(&app, "GET", "/api/v1/history/stats", None).await;
        assert_eq!(body["total_problems"], 1);

        let (_, body) = call(&app, "GET", "/api/v1/history/export", None).await;
        assert_eq!(body["problems"].as_array().unwrap().len(), 1);

        let (status, body) = call(&app, "POST", "/api/v1/history/cleanup", Some(json!({ "max_records": 0 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);
        assert_eq!(body["remaining"], 0);
    }
}
