use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use tuckin_shared::errors::{AppError, AppResult, ErrorCode};
use tuckin_shared::types::api::ApiResponse;
use tuckin_shared::types::auth::AuthUser;

use crate::rating::{RatingInput, SubmitReport};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRatingsRequest {
    #[validate(length(min = 1, message = "session token is required"))]
    pub session_token: String,
    #[serde(default)]
    pub ratings: Vec<RatingInput>,
}

// ---------------------------------------------------------------------------
// POST /ratings/submit
// ---------------------------------------------------------------------------

pub async fn submit(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRatingsRequest>,
) -> AppResult<Json<ApiResponse<SubmitReport>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let report = state
        .ratings
        .submit(&req.session_token, auth_user.id, &req.ratings)
        .await?;
    Ok(Json(ApiResponse::ok(report)))
}
