use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use tuckin_shared::errors::{AppError, AppResult, ErrorCode};
use tuckin_shared::types::api::ApiResponse;
use tuckin_shared::types::auth::AuthUser;

use crate::domain::{DiningEvent, EventId};
use crate::rating::RatingForm;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Both fields blank means the restaurant takes walk-ins.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ConfirmRequest {
    #[serde(default)]
    #[validate(length(max = 50, message = "reservation name is too long"))]
    pub reservation_name: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "reservation phone is too long"))]
    pub reservation_phone: String,
}

// ---------------------------------------------------------------------------
// POST /dining-events/:id/start-confirming
// ---------------------------------------------------------------------------

pub async fn start_confirming(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<EventId>,
) -> AppResult<Json<ApiResponse<DiningEvent>>> {
    let event = state.lifecycle.start_confirming(event_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(event)))
}

// ---------------------------------------------------------------------------
// POST /dining-events/:id/confirm
// ---------------------------------------------------------------------------

pub async fn confirm(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<EventId>,
    Json(req): Json<ConfirmRequest>,
) -> AppResult<Json<ApiResponse<DiningEvent>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let event = state
        .lifecycle
        .confirm(event_id, auth_user.id, &req.reservation_name, &req.reservation_phone)
        .await?;
    Ok(Json(ApiResponse::ok(event)))
}

// ---------------------------------------------------------------------------
// POST /dining-events/:id/change-restaurant
// ---------------------------------------------------------------------------

pub async fn change_restaurant(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<EventId>,
) -> AppResult<Json<ApiResponse<DiningEvent>>> {
    let event = state.lifecycle.swap_restaurant(event_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(event)))
}

// ---------------------------------------------------------------------------
// GET /dining-events/:id/rating-form
// ---------------------------------------------------------------------------

pub async fn rating_form(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<EventId>,
) -> AppResult<Json<ApiResponse<RatingForm>>> {
    let form = state.ratings.get_form(event_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(form)))
}
