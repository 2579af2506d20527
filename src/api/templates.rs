use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::access::Resource;
use crate::api::auth::require_capability;
use crate::api::{new_id, require_text};
use crate::error::{AppError, AppResult};
use crate::models::{Category, ProjectTemplate};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{template_id}",
            get(get_template)
                .put(replace_template)
                .delete(delete_template),
        )
        .route_layer(middleware::from_fn_with_state(
            Resource::Projects,
            require_capability,
        ))
}

/// A template is either given its categories directly or copies them from an
/// existing project.
#[derive(Debug, Deserialize)]
struct CreateTemplateRequest {
    name: String,
    #[serde(default)]
    categories: Vec<Category>,
    from_project: Option<String>,
}

async fn list_templates(State(state): State<AppState>) -> AppResult<Json<Vec<ProjectTemplate>>> {
    Ok(Json(state.templates.list().await?))
}

async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> AppResult<Json<ProjectTemplate>> {
    Ok(Json(state.templates.get(&template_id).await?))
}

async fn create_template(
    State(state): State<AppState>,
    Json(payload): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<ProjectTemplate>)> {
    let name = require_text("name", &payload.name)?;

    let categories = match payload.from_project.as_deref() {
        Some(project_id) => state.projects.get(project_id).await?.categories,
        None => payload.categories,
    };
    if categories.is_empty() {
        return Err(AppError::validation(
            "a template needs at least one category",
        ));
    }

    // Stored in the reset form a new project receives.
    let draft = ProjectTemplate {
        id: new_id("tpl"),
        name,
        categories,
    };
    let template = ProjectTemplate {
        categories: draft.instantiate(),
        ..draft
    };

    let template = state.templates.insert(template).await?;
    tracing::info!(template_id = %template.id, "template created");
    Ok((StatusCode::CREATED, Json(template)))
}

#[derive(Debug, Deserialize)]
struct ReplaceTemplateRequest {
    name: String,
    categories: Vec<Category>,
}

/// Overwrites the template, creating it under `template_id` when it does not exist.
async fn replace_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(payload): Json<ReplaceTemplateRequest>,
) -> AppResult<Json<ProjectTemplate>> {
    if payload.categories.is_empty() {
        return Err(AppError::validation(
            "a template needs at least one category",
        ));
    }

    let draft = ProjectTemplate {
        id: template_id,
        name: require_text("name", &payload.name)?,
        categories: payload.categories,
    };
    let template = ProjectTemplate {
        categories: draft.instantiate(),
        ..draft
    };
    Ok(Json(state.templates.save(template).await?))
}

async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> AppResult<StatusCode> {
    state.templates.delete(&template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
