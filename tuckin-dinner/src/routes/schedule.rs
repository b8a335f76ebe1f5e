use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use tuckin_shared::errors::{AppError, AppResult, ErrorCode};
use tuckin_shared::types::api::{ApiResponse, TaskAccepted};
use tuckin_shared::types::auth::CronCaller;

use crate::domain::TaskType;
use crate::scheduler::generate::GenerateReport;
use crate::scheduler::TickReport;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /schedule/generate
// ---------------------------------------------------------------------------

pub async fn generate(
    _cron: CronCaller,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<GenerateReport>>> {
    let report = state.scheduler.generate().await?;
    Ok(Json(ApiResponse::ok(report)))
}

// ---------------------------------------------------------------------------
// POST /schedule/tick
// ---------------------------------------------------------------------------

pub async fn tick(
    _cron: CronCaller,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<TickReport>>> {
    let report = state.scheduler.fire_due().await?;
    Ok(Json(ApiResponse::ok(report)))
}

// ---------------------------------------------------------------------------
// POST /schedule/run/:task_type
// ---------------------------------------------------------------------------

/// Accepts the task and runs it in the background.
pub async fn run_task(
    _cron: CronCaller,
    State(state): State<Arc<AppState>>,
    Path(task_type): Path<String>,
) -> AppResult<(StatusCode, Json<ApiResponse<TaskAccepted>>)> {
    let parsed: TaskType = task_type
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::UnknownTaskType, e))?;

    state.scheduler.spawn_task(parsed);
    tracing::info!(task_type = parsed.as_str(), "manual task accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(TaskAccepted {
            task: parsed.as_str().to_string(),
            accepted: true,
        })),
    ))
}
