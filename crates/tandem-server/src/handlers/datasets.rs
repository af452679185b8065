//! Dataset handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::{require_user, with_db, AppError, AppState};
use tandem_core::models::{Dataset, DatasetSummary};

/// GET /api/datasets - List the caller's datasets
pub async fn list_datasets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DatasetSummary>>, AppError> {
    let user_id = require_user(&headers)?;

    let datasets = with_db(&state, move |db| {
        let datasets = db.list_datasets(&user_id)?;
        db.log_audit(
            &user_id,
            "list",
            Some("dataset"),
            None,
            Some(&format!("count={}", datasets.len())),
        )?;
        Ok(datasets)
    })
    .await?;

    Ok(Json(datasets))
}

/// GET /api/datasets/:id - Get one dataset with its rows
///
/// Datasets owned by someone else are reported as not found.
pub async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Dataset>, AppError> {
    let user_id = require_user(&headers)?;

    let dataset = with_db(&state, move |db| {
        let dataset = db
            .get_dataset(&id)?
            .filter(|d| d.is_owned_by(&user_id))
            .ok_or_else(|| tandem_core::Error::NotFound(format!("Dataset {} not found", id)))?;
        db.log_audit(&user_id, "view", Some("dataset"), Some(&id), None)?;
        Ok(dataset)
    })
    .await?;

    Ok(Json(dataset))
}
