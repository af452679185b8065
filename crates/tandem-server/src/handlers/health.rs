//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use tandem_core::ai::{AIBackend, BackendInfo};
use tandem_core::insights::CacheStats;

/// Response for the /api/health endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Global AI switch (`TANDEM_AI_ENABLED`)
    pub ai_enabled: bool,
    /// Configured AI backend, if any
    pub ai_backend: Option<BackendInfo>,
    pub cache: CacheStats,
}

/// GET /api/health - Liveness plus AI and cache status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ai_enabled: orchestrator.settings().ai_enabled,
        ai_backend: orchestrator.ai().map(|ai| ai.client().info()),
        cache: orchestrator.cache().stats().await,
    })
}
