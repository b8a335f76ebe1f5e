use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use tuckin_shared::errors::AppResult;
use tuckin_shared::types::api::ApiResponse;
use tuckin_shared::types::auth::AuthUser;

use crate::domain::RestaurantId;
use crate::state::AppState;
use crate::voting::VoteOutcome;

// ---------------------------------------------------------------------------
// POST /restaurants/:id/vote
// ---------------------------------------------------------------------------

pub async fn cast_vote(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(restaurant_id): Path<RestaurantId>,
) -> AppResult<Json<ApiResponse<VoteOutcome>>> {
    let outcome = state.voting.cast_vote(restaurant_id, auth_user.id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
