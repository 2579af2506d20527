use axum::extract::{Query, State};
use axum::middleware;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Resource;
use crate::analytics::schedule::{
    classify, schedule_grid, span_days, unscheduled_tasks, ScheduleGrid, ScheduleWindow,
    UnscheduledTask, WorkloadBand, WorkloadMap, MAX_WINDOW_DAYS,
};
use crate::api::auth::require_capability;
use crate::api::tasks::{patch_task, TaskPath};
use crate::error::{AppError, AppResult};
use crate::models::SubTask;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule", get(get_schedule))
        .route("/schedule/unscheduled", get(list_unscheduled))
        .route("/schedule/tasks", put(schedule_task))
        .route_layer(middleware::from_fn_with_state(
            Resource::Schedule,
            require_capability,
        ))
}

#[derive(Debug, Deserialize)]
struct ScheduleQuery {
    start: Option<NaiveDate>,
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ScheduleTaskRequest {
    project_id: String,
    category_id: String,
    task_id: String,
    technician_id: String,
    start_date: NaiveDate,
    due_date: NaiveDate,
}

/// The scheduled task plus the busiest day it now lands on for its technician.
/// Overlaps are allowed; the band tells the caller whether they overbooked.
#[derive(Debug, Serialize)]
pub struct ScheduledTask {
    pub task: SubTask,
    pub peak_hours: f64,
    pub peak_band: WorkloadBand,
}

async fn get_schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<Json<ScheduleGrid>> {
    let days = query.days.unwrap_or(state.config.schedule_days);
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(AppError::validation(format!(
            "days must be between 1 and {MAX_WINDOW_DAYS}"
        )));
    }

    let start = query.start.unwrap_or_else(|| Utc::now().date_naive());
    let window = ScheduleWindow::new(start, days).ok_or_else(|| {
        AppError::validation(format!("a {days}-day window from {start} runs past the calendar"))
    })?;
    let projects = state.projects.list().await?;
    let technicians = state.technicians.list().await?;

    Ok(Json(schedule_grid(
        &projects,
        &technicians,
        &window,
        state.config.daily_capacity_hours,
    )))
}

async fn list_unscheduled(State(state): State<AppState>) -> AppResult<Json<Vec<UnscheduledTask>>> {
    let projects = state.projects.list().await?;
    Ok(Json(unscheduled_tasks(&projects)))
}

async fn schedule_task(
    State(state): State<AppState>,
    Json(payload): Json<ScheduleTaskRequest>,
) -> AppResult<Json<ScheduledTask>> {
    let Some(span) = span_days(payload.start_date, payload.due_date) else {
        return Err(AppError::validation("due_date cannot be before start_date"));
    };
    state.technicians.get(&payload.technician_id).await?;

    let path = TaskPath {
        project_id: payload.project_id,
        category_id: payload.category_id,
        task_id: payload.task_id,
    };
    let technician_id = payload.technician_id.clone();
    let task = patch_task(&state, &path, |task| {
        task.assigned_to = Some(payload.technician_id);
        task.start_date = Some(payload.start_date);
        task.due_date = Some(payload.due_date);
        Ok(())
    })
    .await?;

    let window = ScheduleWindow::new(
        payload.start_date,
        span.min(i64::from(MAX_WINDOW_DAYS)) as u32,
    )
    .ok_or_else(|| AppError::validation("schedule window runs past the calendar"))?;
    let projects = state.projects.list().await?;
    let peak_hours = WorkloadMap::build(&projects, &window).peak(&technician_id, window.dates());
    let peak_band = classify(peak_hours, state.config.daily_capacity_hours);

    if peak_band == WorkloadBand::OverCapacity {
        tracing::warn!(
            task_id = %path.task_id,
            %technician_id,
            peak_hours,
            "task scheduled over daily capacity"
        );
    }

    Ok(Json(ScheduledTask {
        task,
        peak_hours,
        peak_band,
    }))
}
