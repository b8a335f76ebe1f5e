use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use tuckin_shared::errors::AppResult;
use tuckin_shared::types::api::ApiResponse;
use tuckin_shared::types::auth::CronCaller;

use crate::domain::UserId;
use crate::scheduler::reminders::ReminderReport;
use crate::scheduler::{ReminderKind, ReminderOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TestReminderRequest {
    pub reminder_type: String,
    #[serde(default)]
    pub options: ReminderOptions,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub reminder_type: String,
}

#[derive(Debug, Serialize)]
pub struct ReminderPreview {
    pub reminder_type: ReminderKind,
    pub count: usize,
    pub user_ids: Vec<UserId>,
}

// ---------------------------------------------------------------------------
// POST /reminders/test
// ---------------------------------------------------------------------------

pub async fn test_reminders(
    _cron: CronCaller,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TestReminderRequest>,
) -> AppResult<Json<ApiResponse<ReminderReport>>> {
    let kind: ReminderKind = req.reminder_type.parse()?;
    let report = state.reminders.send(kind, &req.options).await?;
    Ok(Json(ApiResponse::ok(report)))
}

// ---------------------------------------------------------------------------
// GET /reminders/preview
// ---------------------------------------------------------------------------

pub async fn preview(
    _cron: CronCaller,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> AppResult<Json<ApiResponse<ReminderPreview>>> {
    let kind: ReminderKind = query.reminder_type.parse()?;
    let user_ids = state.reminders.recipients(kind).await?;
    Ok(Json(ApiResponse::ok(ReminderPreview {
        reminder_type: kind,
        count: user_ids.len(),
        user_ids,
    })))
}
