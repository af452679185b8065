//! Authentication-related handlers

use axum::{http::HeaderMap, Json};
use serde::Serialize;

use crate::{require_user, AppError};

/// Response for the /api/me endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    /// The caller's user id as forwarded by the gateway
    pub user_id: String,
}

/// GET /api/me - Echo the caller's identity
pub async fn get_me(headers: HeaderMap) -> Result<Json<MeResponse>, AppError> {
    let user_id = require_user(&headers)?;
    Ok(Json(MeResponse { user_id }))
}
