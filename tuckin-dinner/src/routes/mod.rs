use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tuckin_shared::middleware::metrics_middleware;

use crate::state::AppState;

pub mod dining;
pub mod dinner_time;
pub mod health;
pub mod ratings;
pub mod reminders;
pub mod schedule;
pub mod votes;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/dinner-time", get(dinner_time::dinner_time))
        // App users
        .route("/dining-events/:id/start-confirming", post(dining::start_confirming))
        .route("/dining-events/:id/confirm", post(dining::confirm))
        .route("/dining-events/:id/change-restaurant", post(dining::change_restaurant))
        .route("/dining-events/:id/rating-form", get(dining::rating_form))
        .route("/restaurants/:id/vote", post(votes::cast_vote))
        .route("/ratings/submit", post(ratings::submit))
        // Cron callers
        .route("/schedule/generate", post(schedule::generate))
        .route("/schedule/tick", post(schedule::tick))
        .route("/schedule/run/:task_type", post(schedule::run_task))
        .route("/reminders/test", post(reminders::test_reminders))
        .route("/reminders/preview", get(reminders::preview))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(metrics_middleware)),
        )
        .with_state(state)
}
