use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Resource;
use crate::api::auth::{require_capability, role_from_headers, user_from_headers};
use crate::api::categories::category_in;
use crate::api::{new_id, require_text};
use crate::error::{AppError, AppResult};
use crate::models::{
    InternalNote, NoteKind, Part, PartStatus, Project, SubTask, SubTaskStatus, UserRole,
};
use crate::state::AppState;

const TASK_PATH: &str = "/projects/{project_id}/categories/{category_id}/tasks/{task_id}";

pub fn router() -> Router<AppState> {
    let staff = Router::new()
        .route(&format!("{TASK_PATH}/assignee"), put(assign_technician))
        .route(
            &format!("{TASK_PATH}/client-approval/toggle"),
            post(toggle_client_approval),
        )
        .route(&format!("{TASK_PATH}/parts"), post(add_part))
        .route(
            &format!("{TASK_PATH}/parts/{{part_id}}/cycle"),
            post(cycle_part_status),
        )
        .route_layer(middleware::from_fn_with_state(
            Resource::Projects,
            require_capability,
        ));

    // Technicians reach these too, limited to tasks assigned to them.
    let own_work = Router::new()
        .route("/my-tasks", get(list_my_tasks))
        .route(&format!("{TASK_PATH}/cycle"), post(cycle_status))
        .route(&format!("{TASK_PATH}/status"), put(set_status))
        .route(&format!("{TASK_PATH}/time"), post(log_time))
        .route(&format!("{TASK_PATH}/notes"), post(add_note))
        .route_layer(middleware::from_fn_with_state(
            Resource::MyTasks,
            require_capability,
        ));

    let decisions = Router::new()
        .route(&format!("{TASK_PATH}/approve"), post(approve))
        .route(&format!("{TASK_PATH}/decline"), post(decline))
        .route_layer(middleware::from_fn_with_state(
            Resource::ClientPortal,
            require_capability,
        ));

    staff.merge(own_work).merge(decisions)
}

#[derive(Debug, Deserialize)]
pub struct TaskPath {
    pub project_id: String,
    pub category_id: String,
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
struct PartPath {
    project_id: String,
    category_id: String,
    task_id: String,
    part_id: String,
}

#[derive(Debug, Deserialize)]
struct SetStatusRequest {
    status: SubTaskStatus,
}

#[derive(Debug, Deserialize)]
struct AssignRequest {
    technician_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogTimeRequest {
    hours: f64,
}

#[derive(Debug, Deserialize)]
struct NoteRequest {
    author_id: String,
    author_name: String,
    note: String,
    #[serde(default = "default_note_kind")]
    kind: NoteKind,
}

fn default_note_kind() -> NoteKind {
    NoteKind::Log
}

#[derive(Debug, Deserialize)]
struct PartRequest {
    name: String,
    part_number: Option<String>,
    supplier: Option<String>,
    #[serde(default = "default_qty")]
    qty: u32,
    unit_cost: Option<f64>,
    eta: Option<NaiveDate>,
}

fn default_qty() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct MyTasksQuery {
    user_id: String,
}

#[derive(Debug, Serialize)]
pub struct AssignedTask {
    pub project_id: String,
    pub project_name: String,
    pub category_id: String,
    pub category_name: String,
    pub task: SubTask,
}

async fn cycle_status(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
    headers: HeaderMap,
) -> AppResult<Json<SubTask>> {
    let scope = assignee_scope(&state, &headers).await?;
    let now = Utc::now();
    let task = patch_task(&state, &path, |task| {
        ensure_in_scope(task, scope.as_deref())?;
        task.advance_status(now);
        Ok(())
    })
    .await?;
    tracing::debug!(task_id = %path.task_id, status = ?task.status, "task status cycled");
    Ok(Json(task))
}

async fn set_status(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
    headers: HeaderMap,
    Json(payload): Json<SetStatusRequest>,
) -> AppResult<Json<SubTask>> {
    let scope = assignee_scope(&state, &headers).await?;
    let now = Utc::now();
    let task = patch_task(&state, &path, |task| {
        ensure_in_scope(task, scope.as_deref())?;
        task.set_status(payload.status, now);
        Ok(())
    })
    .await?;
    Ok(Json(task))
}

async fn assign_technician(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<Json<SubTask>> {
    if let Some(technician_id) = payload.technician_id.as_deref() {
        state.technicians.get(technician_id).await?;
    }

    let task = patch_task(&state, &path, |task| {
        task.assigned_to = payload.technician_id;
        Ok(())
    })
    .await?;
    Ok(Json(task))
}

async fn toggle_client_approval(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
) -> AppResult<Json<SubTask>> {
    let task = patch_task(&state, &path, |task| {
        task.requires_client_approval = !task.requires_client_approval;
        Ok(())
    })
    .await?;
    Ok(Json(task))
}

async fn log_time(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
    headers: HeaderMap,
    Json(payload): Json<LogTimeRequest>,
) -> AppResult<Json<SubTask>> {
    if !payload.hours.is_finite() || payload.hours <= 0.0 {
        return Err(AppError::validation("hours must be greater than 0"));
    }

    let scope = assignee_scope(&state, &headers).await?;
    let task = patch_task(&state, &path, |task| {
        ensure_in_scope(task, scope.as_deref())?;
        task.actual_hours = Some(task.actual_hours.unwrap_or(0.0) + payload.hours);
        Ok(())
    })
    .await?;
    tracing::info!(task_id = %path.task_id, hours = payload.hours, "time logged");
    Ok(Json(task))
}

async fn add_note(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
    headers: HeaderMap,
    Json(payload): Json<NoteRequest>,
) -> AppResult<(StatusCode, Json<InternalNote>)> {
    let scope = assignee_scope(&state, &headers).await?;
    let note = InternalNote {
        id: new_id("note"),
        author_id: require_text("author_id", &payload.author_id)?,
        author_name: require_text("author_name", &payload.author_name)?,
        note: require_text("note", &payload.note)?,
        kind: payload.kind,
        created_at: Utc::now(),
    };

    let created = note.clone();
    patch_task(&state, &path, |task| {
        ensure_in_scope(task, scope.as_deref())?;
        task.internal_notes.push(note);
        Ok(())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn add_part(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
    Json(payload): Json<PartRequest>,
) -> AppResult<(StatusCode, Json<Part>)> {
    if payload.qty == 0 {
        return Err(AppError::validation("qty must be at least 1"));
    }
    if payload
        .unit_cost
        .is_some_and(|cost| !cost.is_finite() || cost < 0.0)
    {
        return Err(AppError::validation("unit_cost cannot be negative"));
    }

    let part = Part {
        id: new_id("part"),
        task_id: path.task_id.clone(),
        name: require_text("name", &payload.name)?,
        part_number: payload.part_number,
        supplier: payload.supplier,
        qty: payload.qty,
        unit_cost: payload.unit_cost,
        status: PartStatus::Needed,
        eta: payload.eta,
    };

    let created = part.clone();
    patch_task(&state, &path, |task| {
        task.parts.push(part);
        Ok(())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn cycle_part_status(
    State(state): State<AppState>,
    Path(path): Path<PartPath>,
) -> AppResult<Json<Part>> {
    let task_path = TaskPath {
        project_id: path.project_id,
        category_id: path.category_id,
        task_id: path.task_id,
    };

    let mut cycled = None;
    patch_task(&state, &task_path, |task| {
        let part = task
            .parts
            .iter_mut()
            .find(|part| part.id == path.part_id)
            .ok_or_else(|| AppError::not_found("part", &path.part_id))?;
        part.status = part.status.next();
        cycled = Some(part.clone());
        Ok(())
    })
    .await?;

    cycled
        .map(Json)
        .ok_or_else(|| AppError::not_found("part", &path.part_id))
}

/// Client accepted the proposed work.
async fn approve(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
) -> AppResult<Json<SubTask>> {
    let now = Utc::now();
    let task = patch_task(&state, &path, |task| {
        ensure_awaiting_client(task)?;
        task.set_status(SubTaskStatus::Completed, now);
        Ok(())
    })
    .await?;
    tracing::info!(task_id = %path.task_id, "client approved task");
    Ok(Json(task))
}

/// Client turned the proposal down; the task goes back to pending without
/// needing approval again.
async fn decline(
    State(state): State<AppState>,
    Path(path): Path<TaskPath>,
) -> AppResult<Json<SubTask>> {
    let now = Utc::now();
    let task = patch_task(&state, &path, |task| {
        ensure_awaiting_client(task)?;
        task.set_status(SubTaskStatus::Pending, now);
        task.requires_client_approval = false;
        Ok(())
    })
    .await?;
    tracing::info!(task_id = %path.task_id, "client declined task");
    Ok(Json(task))
}

fn ensure_awaiting_client(task: &SubTask) -> AppResult<()> {
    if task.awaits_client() {
        return Ok(());
    }
    Err(AppError::Conflict(format!(
        "task '{}' is not awaiting a client decision",
        task.id
    )))
}

/// Technician id a technician caller is limited to, resolved from the user
/// header. Other roles are not limited.
async fn assignee_scope(state: &AppState, headers: &HeaderMap) -> AppResult<Option<String>> {
    if role_from_headers(headers)? != UserRole::Technician {
        return Ok(None);
    }

    let user_id = user_from_headers(headers).ok_or(AppError::Unauthorized)?;
    let technician = state
        .technicians
        .find(|technician| technician.user_id == user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden(format!("user '{user_id}' is not a technician")))?;
    Ok(Some(technician.id))
}

fn ensure_in_scope(task: &SubTask, scope: Option<&str>) -> AppResult<()> {
    match scope {
        Some(technician_id) if task.assigned_to.as_deref() != Some(technician_id) => Err(
            AppError::Forbidden(format!("task '{}' is not assigned to {technician_id}", task.id)),
        ),
        _ => Ok(()),
    }
}

async fn list_my_tasks(
    State(state): State<AppState>,
    Query(query): Query<MyTasksQuery>,
) -> AppResult<Json<Vec<AssignedTask>>> {
    let technician = state
        .technicians
        .find(|technician| technician.user_id == query.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("technician for user", &query.user_id))?;

    let projects = state.projects.list().await?;
    Ok(Json(assigned_tasks(&projects, &technician.id)))
}

/// Open work assigned to `technician_id` across active and on-hold projects,
/// most urgent first.
pub fn assigned_tasks(projects: &[Project], technician_id: &str) -> Vec<AssignedTask> {
    let mut tasks: Vec<AssignedTask> = projects
        .iter()
        .filter(|project| project.is_schedulable())
        .flat_map(|project| {
            project.categories.iter().flat_map(move |category| {
                category
                    .sub_tasks
                    .iter()
                    .filter(|task| {
                        task.assigned_to.as_deref() == Some(technician_id)
                            && task.status != SubTaskStatus::Completed
                    })
                    .map(move |task| AssignedTask {
                        project_id: project.id.clone(),
                        project_name: project.vehicle.display_name(),
                        category_id: category.id.clone(),
                        category_name: category.name.clone(),
                        task: task.clone(),
                    })
            })
        })
        .collect();

    tasks.sort_by_key(|assigned| assigned.task.priority.rank());
    tasks
}

/// Applies `patch` to one subtask inside a single project update and returns
/// the patched subtask.
pub(crate) async fn patch_task<F>(state: &AppState, path: &TaskPath, patch: F) -> AppResult<SubTask>
where
    F: FnOnce(&mut SubTask) -> AppResult<()>,
{
    let mut patched = None;
    state
        .projects
        .update(&path.project_id, |project| {
            let task = task_in(project, &path.category_id, &path.task_id)?;
            patch(task)?;
            patched = Some(task.clone());
            Ok(())
        })
        .await?;

    patched.ok_or_else(|| AppError::not_found("task", &path.task_id))
}

fn task_in<'a>(
    project: &'a mut Project,
    category_id: &str,
    task_id: &str,
) -> AppResult<&'a mut SubTask> {
    category_in(project, category_id)?
        .sub_task_mut(task_id)
        .ok_or_else(|| AppError::not_found("task", task_id))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::{json, Value};

    use super::assigned_tasks;
    use crate::api::auth::{ROLE_HEADER, USER_HEADER};
    use crate::api::testing::test_server;
    use crate::db::fixtures;
    use crate::models::{Part, PartStatus, SubTask, SubTaskStatus};

    const PAINT: &str = "/api/v1/projects/mustang-1969-smith/categories/bp/tasks/bp5";
    const WIRING: &str = "/api/v1/projects/camaro-1969-davis/categories/cam-int/tasks/cam-int3";

    #[tokio::test]
    async fn cycling_walks_the_status_machine() {
        let (_temp_dir, server) = test_server("cycle-task").await;

        let mut statuses = Vec::new();
        for _ in 0..4 {
            let task: SubTask = server
                .post(&format!("{WIRING}/cycle"))
                .add_header(ROLE_HEADER, "manager")
                .await
                .json();
            statuses.push((task.status, task.completed_at.is_some()));
        }

        assert_eq!(
            statuses,
            vec![
                (SubTaskStatus::InProgress, false),
                (SubTaskStatus::AwaitingApproval, false),
                (SubTaskStatus::Completed, true),
                (SubTaskStatus::Pending, false),
            ]
        );
    }

    #[tokio::test]
    async fn decline_resets_and_clears_approval_flag() {
        let (_temp_dir, server) = test_server("decline-task").await;

        let task: SubTask = server
            .post(&format!("{PAINT}/decline"))
            .add_header(ROLE_HEADER, "manager")
            .await
            .json();
        assert_eq!(task.status, SubTaskStatus::Pending);
        assert!(!task.requires_client_approval);

        server
            .post(&format!("{PAINT}/decline"))
            .add_header(ROLE_HEADER, "manager")
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn approve_completes_the_task() {
        let (_temp_dir, server) = test_server("approve-task").await;

        let task: SubTask = server
            .post(&format!("{PAINT}/approve"))
            .add_header(ROLE_HEADER, "manager")
            .await
            .json();
        assert_eq!(task.status, SubTaskStatus::Completed);
        assert!(task.completed_at.is_some());

        server
            .post(&format!("{WIRING}/approve"))
            .add_header(ROLE_HEADER, "manager")
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn logged_time_accumulates_and_must_be_positive() {
        let (_temp_dir, server) = test_server("log-time").await;

        for hours in [1.5, 2.0] {
            server
                .post(&format!("{WIRING}/time"))
                .add_header(ROLE_HEADER, "manager")
                .json(&json!({"hours": hours}))
                .await
                .assert_status_ok();
        }
        let task: SubTask = server
            .post(&format!("{WIRING}/time"))
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"hours": 0.5}))
            .await
            .json();
        assert_eq!(task.actual_hours, Some(4.0));

        server
            .post(&format!("{WIRING}/time"))
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"hours": 0.0}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn parts_start_needed_and_cycle() {
        let (_temp_dir, server) = test_server("parts").await;

        let response = server
            .post(&format!("{WIRING}/parts"))
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"name": "Dash bezel", "qty": 2, "unit_cost": 1200.0}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let part: Part = response.json();
        assert_eq!(part.status, PartStatus::Needed);
        assert_eq!(part.task_id, "cam-int3");

        let cycled: Part = server
            .post(&format!("{WIRING}/parts/{}/cycle", part.id))
            .add_header(ROLE_HEADER, "manager")
            .await
            .json();
        assert_eq!(cycled.status, PartStatus::Ordered);

        server
            .post(&format!("{WIRING}/parts/part-missing/cycle"))
            .add_header(ROLE_HEADER, "manager")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn assigning_requires_a_known_technician() {
        let (_temp_dir, server) = test_server("assign").await;

        server
            .put(&format!("{WIRING}/assignee"))
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"technician_id": "tech-nobody"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let task: SubTask = server
            .put(&format!("{WIRING}/assignee"))
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"technician_id": "tech-dean"}))
            .await
            .json();
        assert_eq!(task.assigned_to.as_deref(), Some("tech-dean"));
    }

    #[tokio::test]
    async fn technicians_see_their_own_tasks() {
        let (_temp_dir, server) = test_server("my-tasks").await;

        let response = server
            .get("/api/v1/my-tasks")
            .add_query_param("user_id", "user-tech-jovan")
            .add_header(ROLE_HEADER, "technician")
            .await;
        response.assert_status_ok();
        let tasks: Vec<Value> = response.json();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0]["task"]["id"], "bp3");

        server
            .get("/api/v1/my-tasks")
            .add_query_param("user_id", "user-manager")
            .add_header(ROLE_HEADER, "technician")
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .put(&format!("{WIRING}/assignee"))
            .add_header(ROLE_HEADER, "technician")
            .add_header(USER_HEADER, "user-tech-thabo")
            .json(&json!({"technician_id": "tech-thabo"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn technicians_update_only_their_assigned_work() {
        let (_temp_dir, server) = test_server("technician-updates").await;

        let task: SubTask = server
            .post(&format!("{WIRING}/time"))
            .add_header(ROLE_HEADER, "technician")
            .add_header(USER_HEADER, "user-tech-thabo")
            .json(&json!({"hours": 2.5}))
            .await
            .json();
        assert_eq!(task.actual_hours, Some(2.5));

        let task: SubTask = server
            .post(&format!("{WIRING}/cycle"))
            .add_header(ROLE_HEADER, "technician")
            .add_header(USER_HEADER, "user-tech-thabo")
            .await
            .json();
        assert_eq!(task.status, SubTaskStatus::InProgress);

        server
            .post(&format!("{WIRING}/notes"))
            .add_header(ROLE_HEADER, "technician")
            .add_header(USER_HEADER, "user-tech-thabo")
            .json(&json!({"author_id": "user-tech-thabo", "author_name": "Thabo", "note": "Loom traced"}))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post(&format!("{WIRING}/time"))
            .add_header(ROLE_HEADER, "technician")
            .add_header(USER_HEADER, "user-tech-dean")
            .json(&json!({"hours": 1.0}))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        server
            .post(&format!("{WIRING}/time"))
            .add_header(ROLE_HEADER, "technician")
            .json(&json!({"hours": 1.0}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn clients_decide_on_tasks_awaiting_them() {
        let (_temp_dir, server) = test_server("client-decisions").await;
        let engine = "/api/v1/projects/mustang-1969-smith/categories/cs/tasks/cs2";

        let task: SubTask = server
            .post(&format!("{PAINT}/approve"))
            .add_header(ROLE_HEADER, "client")
            .await
            .json();
        assert_eq!(task.status, SubTaskStatus::Completed);

        let task: SubTask = server
            .post(&format!("{engine}/decline"))
            .add_header(ROLE_HEADER, "client")
            .await
            .json();
        assert_eq!(task.status, SubTaskStatus::Pending);
        assert!(!task.requires_client_approval);

        server
            .post(&format!("{WIRING}/cycle"))
            .add_header(ROLE_HEADER, "client")
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post(&format!("{PAINT}/approve"))
            .add_header(ROLE_HEADER, "technician")
            .add_header(USER_HEADER, "user-tech-jovan")
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[test]
    fn completed_projects_are_left_out_of_assigned_work() {
        let projects = fixtures::projects(Utc::now());
        assert!(assigned_tasks(&projects, "tech-dean").is_empty());
        assert_eq!(assigned_tasks(&projects, "tech-thabo").len(), 1);
    }
}
