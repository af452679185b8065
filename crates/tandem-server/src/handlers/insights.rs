//! Insight handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{audit_or_warn, require_user, AppError, AppState};
use tandem_core::{DashboardFilters, DatasetInsight, GeneratedBy, NarrativeSummary};

/// Query parameters for insight endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightQuery {
    /// JSON object `{"categorical": {field: [values]}}`; invalid means no filters
    pub filters: Option<String>,
    /// Skip the cache read (the result is still cached)
    #[serde(default)]
    pub force_refresh: bool,
}

/// Response for GET /api/datasets/:id/insights
#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub insights: Vec<DatasetInsight>,
    pub metadata: InsightsMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsMetadata {
    pub count: usize,
    pub from_cache: bool,
    pub generated_by: GeneratedBy,
    pub elapsed_ms: u64,
}

/// Response for cache invalidation
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

/// GET /api/datasets/:id/insights - Generate or fetch cached insights
pub async fn get_insights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<InsightQuery>,
    headers: HeaderMap,
) -> Result<Json<InsightsResponse>, AppError> {
    let user_id = require_user(&headers)?;
    let filters = DashboardFilters::from_query(params.filters.as_deref());

    let result = state
        .orchestrator
        .generate(&id, &user_id, &filters, params.force_refresh)
        .await?;

    let details = format!(
        "count={}, from_cache={}, generated_by={}, filters_digest={}",
        result.insights.len(),
        result.from_cache,
        result.generated_by,
        filters.digest()
    );
    audit_or_warn(&state, "insights", move |db| {
        db.log_audit(&user_id, "insights", Some("dataset"), Some(&id), Some(&details))
    })
    .await;

    Ok(Json(InsightsResponse {
        metadata: InsightsMetadata {
            count: result.insights.len(),
            from_cache: result.from_cache,
            generated_by: result.generated_by,
            elapsed_ms: result.elapsed_ms,
        },
        insights: result.insights,
    }))
}

/// DELETE /api/datasets/:id/insights/cache - Drop cached insights for a dataset
pub async fn invalidate_insights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvalidateResponse>, AppError> {
    let user_id = require_user(&headers)?;

    let removed = state.orchestrator.invalidate(&id, &user_id).await?;

    audit_or_warn(&state, "invalidate", move |db| {
        db.log_audit(
            &user_id,
            "invalidate",
            Some("insight_cache"),
            Some(&id),
            Some(&format!("removed={}", removed)),
        )
    })
    .await;

    Ok(Json(InvalidateResponse { removed }))
}

/// GET /api/datasets/:id/summary - AI-written narrative of the comparison
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<InsightQuery>,
    headers: HeaderMap,
) -> Result<Json<NarrativeSummary>, AppError> {
    let user_id = require_user(&headers)?;
    let filters = DashboardFilters::from_query(params.filters.as_deref());

    let summary = state.orchestrator.summarize(&id, &user_id, &filters).await?;

    audit_or_warn(&state, "summary", move |db| {
        db.log_audit(&user_id, "summary", Some("dataset"), Some(&id), None)
    })
    .await;

    Ok(Json(summary))
}
