use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tuckin_shared::errors::AppResult;
use tuckin_shared::types::api::ApiResponse;
use tuckin_shared::types::auth::AuthUser;

use crate::calendar::{dinner_time_info, DinnerTimeInfo};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /dinner-time
// ---------------------------------------------------------------------------

/// Public; a signed-in caller also gets the page stage for their status.
pub async fn dinner_time(
    auth_user: Option<AuthUser>,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<DinnerTimeInfo>>> {
    let status = match auth_user {
        Some(user) => state.store.user_status(user.id).await?,
        None => None,
    };
    let info = dinner_time_info(state.clock.now(), status)?;
    Ok(Json(ApiResponse::ok(info)))
}
