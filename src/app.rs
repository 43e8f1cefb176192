use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/habits",
            get(handlers::list_habits).post(handlers::create_habit),
        )
        .route(
            "/api/habits/:id",
            get(handlers::get_habit)
                .put(handlers::update_habit)
                .delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/streak", get(handlers::habit_streak))
        .route("/api/checkins", get(handlers::list_checkins))
        .route("/api/checkins/toggle", post(handlers::toggle_checkin))
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::save_settings),
        )
        .route("/api/today", get(handlers::get_today))
        .route("/api/calendar", get(handlers::get_calendar))
        .route("/api/snapshot", get(handlers::get_snapshot))
        .route("/api/export", get(handlers::export))
        .fallback(handlers::shell)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handlers::panic_page))
        .with_state(state)
}
