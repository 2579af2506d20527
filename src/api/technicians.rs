use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::access::Resource;
use crate::analytics::time::{technician_performance, Period, TechnicianPerformance};
use crate::api::auth::require_capability;
use crate::api::{require_text, short_uuid};
use crate::error::{AppError, AppResult};
use crate::models::{Technician, User, UserRole};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let technicians = Router::new()
        .route(
            "/technicians",
            get(list_technicians).post(create_technician),
        )
        .route("/technicians/performance", get(get_performance))
        .route(
            "/technicians/{technician_id}",
            get(get_technician)
                .patch(update_technician)
                .delete(delete_technician),
        )
        .route_layer(middleware::from_fn_with_state(
            Resource::Technicians,
            require_capability,
        ));

    let users = Router::new()
        .route("/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(
            Resource::Settings,
            require_capability,
        ));

    technicians.merge(users)
}

#[derive(Debug, Deserialize)]
struct CreateTechnicianRequest {
    name: String,
    hourly_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct UpdateTechnicianRequest {
    name: Option<String>,
    hourly_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PerformanceQuery {
    #[serde(default = "default_period")]
    period: Period,
}

fn default_period() -> Period {
    Period::ThisWeek
}

async fn list_technicians(State(state): State<AppState>) -> AppResult<Json<Vec<Technician>>> {
    Ok(Json(state.technicians.list().await?))
}

async fn get_technician(
    State(state): State<AppState>,
    Path(technician_id): Path<String>,
) -> AppResult<Json<Technician>> {
    Ok(Json(state.technicians.get(&technician_id).await?))
}

/// Adds a technician together with the `technician` user it signs in as.
async fn create_technician(
    State(state): State<AppState>,
    Json(payload): Json<CreateTechnicianRequest>,
) -> AppResult<(StatusCode, Json<Technician>)> {
    let name = require_text("name", &payload.name)?;
    validate_rate(payload.hourly_rate)?;

    let suffix = short_uuid();
    let user = state
        .users
        .insert(User {
            id: format!("user-tech-{suffix}"),
            name: name.clone(),
            role: UserRole::Technician,
        })
        .await?;

    let technician = Technician {
        id: format!("tech-{suffix}"),
        name,
        user_id: user.id.clone(),
        hourly_rate: payload.hourly_rate,
    };
    let technician = match state.technicians.insert(technician).await {
        Ok(technician) => technician,
        Err(error) => {
            if let Err(cleanup) = state.users.delete(&user.id).await {
                tracing::warn!(user_id = %user.id, error = %cleanup, "failed to remove orphaned user");
            }
            return Err(error);
        }
    };

    tracing::info!(technician_id = %technician.id, "technician added");
    Ok((StatusCode::CREATED, Json(technician)))
}

async fn update_technician(
    State(state): State<AppState>,
    Path(technician_id): Path<String>,
    Json(payload): Json<UpdateTechnicianRequest>,
) -> AppResult<Json<Technician>> {
    if payload.name.is_none() && payload.hourly_rate.is_none() {
        return Err(AppError::validation("at least one field must be provided"));
    }
    let name = payload
        .name
        .as_deref()
        .map(|name| require_text("name", name))
        .transpose()?;
    validate_rate(payload.hourly_rate)?;

    let technician = state
        .technicians
        .update(&technician_id, |technician| {
            if let Some(name) = name.clone() {
                technician.name = name;
            }
            if payload.hourly_rate.is_some() {
                technician.hourly_rate = payload.hourly_rate;
            }
            Ok(())
        })
        .await?;

    if let Some(name) = name {
        state
            .users
            .update(&technician.user_id, |user| {
                user.name = name;
                Ok(())
            })
            .await?;
    }

    Ok(Json(technician))
}

/// Removes the technician and its user. Subtasks keep their assignment.
async fn delete_technician(
    State(state): State<AppState>,
    Path(technician_id): Path<String>,
) -> AppResult<StatusCode> {
    let technician = state.technicians.delete(&technician_id).await?;
    match state.users.delete(&technician.user_id).await {
        Ok(_) | Err(AppError::NotFound(_)) => {}
        Err(error) => return Err(error),
    }

    tracing::info!(%technician_id, "technician removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_performance(
    State(state): State<AppState>,
    Query(query): Query<PerformanceQuery>,
) -> AppResult<Json<Vec<TechnicianPerformance>>> {
    let projects = state.projects.list().await?;
    let shifts = state.shifts.list().await?;
    let technicians = state.technicians.list().await?;

    Ok(Json(technician_performance(
        &projects,
        &shifts,
        &technicians,
        query.period.start(Utc::now()),
    )))
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list().await?))
}

fn validate_rate(hourly_rate: Option<f64>) -> AppResult<()> {
    match hourly_rate {
        Some(rate) if !rate.is_finite() || rate < 0.0 => {
            Err(AppError::validation("hourly_rate cannot be negative"))
        }
        _ => Ok(()),
    }
}
