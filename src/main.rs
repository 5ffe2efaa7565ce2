//! Mathdaily · problem similarity and duplicate-detection service
//!
//! - Axum HTTP + WebSocket API over a corpus of math problems
//! - Append-only problem history with hash fingerprints
//! - Optional OpenAI-backed generation with a bounded uniqueness retry loop
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   MATHDAILY_CONFIG_PATH : path to TOML config (thresholds, history, prompts)
//!   HISTORY_PATH          : history JSON file, or ":memory:"
//!   CORPUS_PATH           : JSON array of corpus entries to preload
//!   OPENAI_API_KEY        : enables generation if present
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-4o-mini"
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod text;
mod concepts;
mod similarity;
mod history;
mod scanner;
mod generation;
mod openai;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Config, history store, corpus and optional OpenAI client.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathdaily", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "mathdaily", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!(target: "mathdaily", "Shutdown signal received"),
    Err(e) => warn!(target: "mathdaily", error = %e, "Failed to listen for Ctrl-C; shutting down"),
  }
}
