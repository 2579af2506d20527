use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::access::Resource;
use crate::analytics::time::{shift_net_hours, tracking_status, TrackingStatus};
use crate::api::auth::require_capability;
use crate::api::new_id;
use crate::error::{AppError, AppResult};
use crate::models::{Break, BreakType, Shift, UserRole};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shifts", get(list_shifts))
        .route("/shifts/clock-in", post(clock_in))
        .route("/shifts/{shift_id}/clock-out", post(clock_out))
        .route("/shifts/{shift_id}/breaks", post(start_break))
        .route("/shifts/{shift_id}/breaks/end", post(end_break))
        .route("/time-tracking/{user_id}", get(get_tracking_status))
        .route_layer(middleware::from_fn_with_state(
            Resource::TimeTracking,
            require_capability,
        ))
}

#[derive(Debug, Deserialize)]
struct ShiftListQuery {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClockInRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct BreakRequest {
    #[serde(rename = "type")]
    kind: BreakType,
}

#[derive(Debug, Serialize)]
pub struct ShiftView {
    #[serde(flatten)]
    pub shift: Shift,
    pub net_hours: f64,
}

impl From<Shift> for ShiftView {
    fn from(shift: Shift) -> Self {
        Self {
            net_hours: shift_net_hours(&shift),
            shift,
        }
    }
}

async fn list_shifts(
    State(state): State<AppState>,
    Query(query): Query<ShiftListQuery>,
) -> AppResult<Json<Vec<ShiftView>>> {
    let mut shifts: Vec<Shift> = state
        .shifts
        .list()
        .await?
        .into_iter()
        .filter(|shift| {
            query
                .user_id
                .as_deref()
                .is_none_or(|user_id| shift.user_id == user_id)
        })
        .collect();
    shifts.sort_by(|left, right| right.clock_in_time.cmp(&left.clock_in_time));

    Ok(Json(shifts.into_iter().map(ShiftView::from).collect()))
}

async fn clock_in(
    State(state): State<AppState>,
    Json(payload): Json<ClockInRequest>,
) -> AppResult<(StatusCode, Json<ShiftView>)> {
    let user = state.users.get(&payload.user_id).await?;
    if user.role != UserRole::Technician {
        return Err(AppError::validation(format!(
            "user '{}' is not a technician",
            user.id
        )));
    }

    let shifts = state.shifts.list().await?;
    if let TrackingStatus::ClockedIn { shift_id } | TrackingStatus::OnBreak { shift_id, .. } =
        tracking_status(&shifts, &user.id)
    {
        return Err(AppError::Conflict(format!(
            "user '{}' is already clocked in on shift '{shift_id}'",
            user.id
        )));
    }

    let shift = state
        .shifts
        .insert(Shift {
            id: new_id("shift"),
            user_id: user.id,
            clock_in_time: Utc::now(),
            clock_out_time: None,
            breaks: Vec::new(),
        })
        .await?;

    tracing::info!(shift_id = %shift.id, user_id = %shift.user_id, "clocked in");
    Ok((StatusCode::CREATED, Json(shift.into())))
}

/// Ends the shift, closing a break that is still running at the same instant.
async fn clock_out(
    State(state): State<AppState>,
    Path(shift_id): Path<String>,
) -> AppResult<Json<ShiftView>> {
    let now = Utc::now();
    let shift = state
        .shifts
        .update(&shift_id, |shift| {
            ensure_open(shift)?;
            if let Some(running) = shift
                .breaks
                .last_mut()
                .filter(|current| current.end_time.is_none())
            {
                running.end_time = Some(now);
            }
            shift.clock_out_time = Some(now);
            Ok(())
        })
        .await?;

    tracing::info!(%shift_id, net_hours = shift_net_hours(&shift), "clocked out");
    Ok(Json(shift.into()))
}

async fn start_break(
    State(state): State<AppState>,
    Path(shift_id): Path<String>,
    Json(payload): Json<BreakRequest>,
) -> AppResult<Json<ShiftView>> {
    let now = Utc::now();
    let shift = state
        .shifts
        .update(&shift_id, |shift| {
            ensure_open(shift)?;
            if shift.open_break().is_some() {
                return Err(AppError::Conflict(format!(
                    "shift '{}' already has a break in progress",
                    shift.id
                )));
            }
            shift.breaks.push(Break {
                kind: payload.kind,
                start_time: now,
                end_time: None,
            });
            Ok(())
        })
        .await?;
    Ok(Json(shift.into()))
}

async fn end_break(
    State(state): State<AppState>,
    Path(shift_id): Path<String>,
) -> AppResult<Json<ShiftView>> {
    let now = Utc::now();
    let shift = state
        .shifts
        .update(&shift_id, |shift| {
            ensure_open(shift)?;
            let running = shift
                .breaks
                .last_mut()
                .filter(|current| current.end_time.is_none())
                .ok_or_else(|| AppError::Conflict("no break in progress".to_string()))?;
            running.end_time = Some(now);
            Ok(())
        })
        .await?;
    Ok(Json(shift.into()))
}

async fn get_tracking_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<TrackingStatus>> {
    state.users.get(&user_id).await?;
    let shifts = state.shifts.list().await?;
    Ok(Json(tracking_status(&shifts, &user_id)))
}

fn ensure_open(shift: &Shift) -> AppResult<()> {
    if shift.is_open() {
        return Ok(());
    }
    Err(AppError::Conflict(format!(
        "shift '{}' is already clocked out",
        shift.id
    )))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::auth::ROLE_HEADER;
    use crate::api::testing::test_server;

    #[tokio::test]
    async fn a_full_shift_with_a_break() {
        let (_temp_dir, server) = test_server("shift-cycle").await;

        let response = server
            .post("/api/v1/shifts/clock-in")
            .add_header(ROLE_HEADER, "technician")
            .json(&json!({"user_id": "user-tech-nico"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let shift: Value = response.json();
        let shift_id = shift["id"].as_str().expect("shift id").to_string();

        server
            .post("/api/v1/shifts/clock-in")
            .add_header(ROLE_HEADER, "technician")
            .json(&json!({"user_id": "user-tech-nico"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .post(&format!("/api/v1/shifts/{shift_id}/breaks"))
            .add_header(ROLE_HEADER, "technician")
            .json(&json!({"type": "tea"}))
            .await
            .assert_status_ok();

        let status: Value = server
            .get("/api/v1/time-tracking/user-tech-nico")
            .add_header(ROLE_HEADER, "technician")
            .await
            .json();
        assert_eq!(status["status"], "on_break");
        assert_eq!(status["break_type"], "tea");

        server
            .post(&format!("/api/v1/shifts/{shift_id}/breaks/end"))
            .add_header(ROLE_HEADER, "technician")
            .await
            .assert_status_ok();
        server
            .post(&format!("/api/v1/shifts/{shift_id}/breaks/end"))
            .add_header(ROLE_HEADER, "technician")
            .await
            .assert_status(StatusCode::CONFLICT);

        let closed: Value = server
            .post(&format!("/api/v1/shifts/{shift_id}/clock-out"))
            .add_header(ROLE_HEADER, "technician")
            .await
            .json();
        assert!(closed["clock_out_time"].is_string());

        let status: Value = server
            .get("/api/v1/time-tracking/user-tech-nico")
            .add_header(ROLE_HEADER, "technician")
            .await
            .json();
        assert_eq!(status["status"], "clocked_out");
    }

    #[tokio::test]
    async fn shifts_filter_by_user_and_report_net_hours() {
        let (_temp_dir, server) = test_server("shift-list").await;

        let shifts: Vec<Value> = server
            .get("/api/v1/shifts")
            .add_query_param("user_id", "user-tech-ruan")
            .add_header(ROLE_HEADER, "manager")
            .await
            .json();
        assert_eq!(shifts.len(), 3);
        assert_eq!(shifts[0]["id"], "shift-14");
        assert_eq!(shifts[0]["net_hours"], json!(8.5));
    }

    #[tokio::test]
    async fn only_technicians_clock_in() {
        let (_temp_dir, server) = test_server("clock-in-role").await;

        server
            .post("/api/v1/shifts/clock-in")
            .add_header(ROLE_HEADER, "boss")
            .json(&json!({"user_id": "user-manager"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/v1/shifts/clock-in")
            .add_header(ROLE_HEADER, "boss")
            .json(&json!({"user_id": "user-ghost"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
