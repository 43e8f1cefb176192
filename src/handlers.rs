use crate::cache::{is_navigation, AssetResponse, ShellRequest};
use crate::errors::AppError;
use crate::models::{
    date_key, parse_date, parse_month, CalendarQuery, Checkin, CheckinQuery, Habit, MonthCalendar,
    NewHabit, Overview, Settings, Snapshot, StreakInfo, ToggleRequest,
};
use crate::state::AppState;
use crate::stats::{build_month, build_overview};
use crate::storage::{delete_habit_with_checkins, load_snapshot};
use crate::streak::calculate_streak;
use crate::ui::render_failure_page;
use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Local;
use std::any::Any;
use tracing::{info, warn};

pub async fn list_habits(State(state): State<AppState>) -> Result<Json<Vec<Habit>>, AppError> {
    Ok(Json(state.storage.habits().get_all().await?))
}

pub async fn get_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Habit>, AppError> {
    let habit = state
        .storage
        .habits()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("habit {id}")))?;
    Ok(Json(habit))
}

pub async fn create_habit(
    State(state): State<AppState>,
    Json(payload): Json<NewHabit>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    require_name(&payload.name)?;
    let habit = Habit::create(payload);
    state.storage.habits().save(&habit).await?;
    info!(habit_id = %habit.id, "habit created");
    Ok((StatusCode::CREATED, Json(habit)))
}

/// Full replacement of a habit. `createdAt` of an existing habit is kept.
pub async fn update_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut habit): Json<Habit>,
) -> Result<Json<Habit>, AppError> {
    if habit.id != id {
        return Err(AppError::bad_request("habit id does not match the path"));
    }
    require_name(&habit.name)?;
    habit.name = habit.name.trim().to_string();

    if let Some(existing) = state.storage.habits().get_by_id(&id).await? {
        habit.created_at = existing.created_at;
    }
    state.storage.habits().save(&habit).await?;
    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let removed = delete_habit_with_checkins(state.storage.as_ref(), &id).await?;
    info!(habit_id = %id, checkins = removed, "habit deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn habit_streak(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreakInfo>, AppError> {
    let habit = state
        .storage
        .habits()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("habit {id}")))?;
    let checkins = state.storage.checkins().get_all().await?;
    Ok(Json(calculate_streak(&habit, &checkins)))
}

pub async fn list_checkins(
    State(state): State<AppState>,
    Query(query): Query<CheckinQuery>,
) -> Result<Json<Vec<Checkin>>, AppError> {
    let checkins = match query.date {
        Some(date) => {
            let date = require_date(&date)?;
            state.storage.checkins().get_by_date(&date).await?
        }
        None => state.storage.checkins().get_all().await?,
    };
    Ok(Json(checkins))
}

pub async fn toggle_checkin(
    State(state): State<AppState>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<Vec<Checkin>>, AppError> {
    let habit_id = payload.habit_id.trim();
    if habit_id.is_empty() {
        return Err(AppError::bad_request("habitId must not be empty"));
    }
    let date = require_date(&payload.date_iso)?;

    if let Err(err) = state
        .storage
        .checkins()
        .toggle(habit_id, &date, payload.completed)
        .await
    {
        warn!(habit_id, date = %date, error = %err, "toggle failed, client must reconcile");
        return Err(err.into());
    }

    Ok(Json(state.storage.checkins().get_by_date(&date).await?))
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    Ok(Json(state.storage.settings().get().await?))
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, AppError> {
    state.storage.settings().save(&settings).await?;
    Ok(Json(settings))
}

pub async fn get_today(State(state): State<AppState>) -> Result<Json<Overview>, AppError> {
    let snapshot = load_snapshot(state.storage.as_ref()).await?;
    Ok(Json(build_overview(
        snapshot.settings.week_starts_on,
        &snapshot.habits,
        &snapshot.checkins,
    )))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<MonthCalendar>, AppError> {
    let month = match query.month {
        Some(value) => parse_month(value.trim())
            .ok_or_else(|| AppError::bad_request(format!("invalid month {value:?}, expected YYYY-MM")))?,
        None => Local::now().date_naive(),
    };
    let snapshot = load_snapshot(state.storage.as_ref()).await?;
    Ok(Json(build_month(
        month,
        snapshot.settings.week_starts_on,
        &snapshot.habits,
        &snapshot.checkins,
    )))
}

pub async fn get_snapshot(State(state): State<AppState>) -> Result<Json<Snapshot>, AppError> {
    Ok(Json(load_snapshot(state.storage.as_ref()).await?))
}

pub async fn export(State(state): State<AppState>) -> Result<Response, AppError> {
    let snapshot = load_snapshot(state.storage.as_ref()).await?;
    let file_name = format!("aura-backup-{}.json", date_key(Local::now().date_naive()));
    let disposition = format!("attachment; filename=\"{file_name}\"");
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(snapshot)).into_response())
}

/// Everything outside `/api` goes through the cache worker.
pub async fn shell(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if uri.path() == "/api" || uri.path().starts_with("/api/") {
        return AppError::not_found(uri.path().to_string()).into_response();
    }
    let Some(worker) = state.cache.as_ref() else {
        return AppError::not_found(uri.path().to_string()).into_response();
    };

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let Some(url) = worker.resolve_same_origin(path) else {
        warn!(path, "refusing request target outside the shell origin");
        return AppError::bad_request(format!("request target {path:?} leaves the app origin"))
            .into_response();
    };

    let navigate = is_navigation(&method, &headers);
    let request = ShellRequest {
        method,
        url,
        navigate,
        body,
    };

    match worker.handle_fetch(request).await {
        Ok(response) => asset_response(response),
        Err(err) if navigate => {
            warn!(path, error = %err, "page load failed with no cached shell");
            let page = render_failure_page("You appear to be offline and the app has not been cached yet.");
            (StatusCode::SERVICE_UNAVAILABLE, Html(page)).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

/// Last-resort boundary for panics escaping a handler.
pub fn panic_page(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    let page = render_failure_page("An unexpected error occurred.");
    (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response()
}

fn asset_response(asset: AssetResponse) -> Response {
    let status = StatusCode::from_u16(asset.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &asset.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(asset.body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

fn require_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    Ok(())
}

/// Accepts only real calendar dates in `YYYY-MM-DD` form and returns the
/// canonical spelling.
fn require_date(value: &str) -> Result<String, AppError> {
    let date = parse_date(value.trim())
        .ok_or_else(|| AppError::bad_request(format!("invalid date {value:?}, expected YYYY-MM-DD")))?;
    let canonical = date_key(date);
    if canonical != value.trim() {
        return Err(AppError::bad_request(format!(
            "invalid date {value:?}, expected YYYY-MM-DD"
        )));
    }
    Ok(canonical)
}
