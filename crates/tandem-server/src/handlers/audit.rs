//! Audit log handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::{require_user, with_db, AppError, AppState, MAX_PAGE_LIMIT};
use tandem_core::AuditEntry;

/// Query parameters for audit log
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    100
}

/// GET /api/audit - List audit log entries
pub async fn list_audit_log(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    let user_id = require_user(&headers)?;
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let entries = with_db(&state, move |db| {
        let entries = db.list_audit_log(limit)?;
        // Audit log - viewing the audit log itself
        db.log_audit(
            &user_id,
            "list",
            Some("audit_log"),
            None,
            Some(&format!("limit={}", limit)),
        )?;
        Ok(entries)
    })
    .await?;

    Ok(Json(entries))
}
