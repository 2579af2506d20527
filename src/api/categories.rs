use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::access::Resource;
use crate::api::auth::require_capability;
use crate::api::projects::timeline_entry;
use crate::api::{new_id, require_text};
use crate::error::{AppError, AppResult};
use crate::models::{Category, Priority, Project, SubTask, SubTaskStatus};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}/categories", post(add_category))
        .route(
            "/projects/{project_id}/categories/{category_id}/tasks",
            post(add_task),
        )
        .route(
            "/projects/{project_id}/categories/{category_id}/qa",
            post(record_qa),
        )
        .route_layer(middleware::from_fn_with_state(
            Resource::Projects,
            require_capability,
        ))
}

#[derive(Debug, Deserialize)]
struct CreateCategoryRequest {
    name: String,
    weight: f64,
    #[serde(default)]
    requires_qa: bool,
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    name: String,
    #[serde(default = "default_priority")]
    priority: Priority,
    estimate_hours: Option<f64>,
    #[serde(default)]
    requires_client_approval: bool,
    price_impact: Option<f64>,
    eta_impact_days: Option<i64>,
    decision_prompt: Option<String>,
}

fn default_priority() -> Priority {
    Priority::Normal
}

#[derive(Debug, Deserialize)]
struct QaRequest {
    passed: bool,
}

async fn add_category(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    if !payload.weight.is_finite() || payload.weight < 0.0 {
        return Err(AppError::validation("weight cannot be negative"));
    }

    let category = Category {
        id: new_id("cat"),
        name: require_text("name", &payload.name)?,
        weight: payload.weight,
        sub_tasks: Vec::new(),
        requires_qa: payload.requires_qa,
        owner: payload.owner,
    };

    let created = category.clone();
    state
        .projects
        .update(&project_id, |project| {
            project.categories.push(category);
            Ok(())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn add_task(
    State(state): State<AppState>,
    Path((project_id, category_id)): Path<(String, String)>,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<SubTask>)> {
    if payload
        .estimate_hours
        .is_some_and(|hours| !hours.is_finite() || hours < 0.0)
    {
        return Err(AppError::validation("estimate_hours cannot be negative"));
    }

    let mut task = SubTask::new(
        new_id("task"),
        require_text("name", &payload.name)?,
        payload.priority,
    );
    task.estimate_hours = payload.estimate_hours;
    task.requires_client_approval = payload.requires_client_approval;
    task.price_impact = payload.price_impact;
    task.eta_impact_days = payload.eta_impact_days;
    task.decision_prompt = payload.decision_prompt;

    let created = task.clone();
    state
        .projects
        .update(&project_id, |project| {
            category_in(project, &category_id)?.sub_tasks.push(task);
            Ok(())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// A failed inspection sends every subtask of the category back to pending.
/// A pass leaves the category as it is.
async fn record_qa(
    State(state): State<AppState>,
    Path((project_id, category_id)): Path<(String, String)>,
    Json(payload): Json<QaRequest>,
) -> AppResult<Json<Category>> {
    if payload.passed {
        let mut project = state.projects.get(&project_id).await?;
        let category = category_in(&mut project, &category_id)?.clone();
        tracing::info!(%project_id, %category_id, "category passed QA");
        return Ok(Json(category));
    }

    let now = Utc::now();
    let mut reset = None;
    state
        .projects
        .update(&project_id, |project| {
            let category = category_in(project, &category_id)?;
            for task in &mut category.sub_tasks {
                task.set_status(SubTaskStatus::Pending, now);
            }
            let update = format!("{} failed QA. All tasks reset to pending.", category.name);
            reset = Some(category.clone());
            project.push_timeline(timeline_entry(now, update, "Quality Control"));
            Ok(())
        })
        .await?;

    tracing::warn!(%project_id, %category_id, "category failed QA, tasks reset");
    reset
        .map(Json)
        .ok_or_else(|| AppError::not_found("category", &category_id))
}

pub(crate) fn category_in<'a>(
    project: &'a mut Project,
    category_id: &str,
) -> AppResult<&'a mut Category> {
    project
        .category_mut(category_id)
        .ok_or_else(|| AppError::not_found("category", category_id))
}
