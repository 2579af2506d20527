use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Resource;
use crate::analytics::progress::{category_progress, overall_progress};
use crate::api::auth::{require_capability, role_from_headers};
use crate::api::{new_id, require_text, short_uuid};
use crate::error::{AppError, AppResult};
use crate::models::{
    DecisionOption, Financials, HoldReason, Media, Message, Project, ProjectStatus,
    SubTaskStatus, TimelineUpdate, Vehicle, Visibility,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let staff = Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project)
                .patch(update_project)
                .delete(delete_project),
        )
        .route("/projects/{project_id}/status", post(change_status))
        .route("/projects/{project_id}/timeline", post(add_timeline_update))
        .route("/projects/{project_id}/media", post(add_media))
        .route_layer(middleware::from_fn_with_state(
            Resource::Projects,
            require_capability,
        ));

    let portal = Router::new()
        .route("/projects/{project_id}/client-view", get(get_client_view))
        .route(
            "/projects/{project_id}/messages",
            get(list_messages).post(post_message),
        )
        .route_layer(middleware::from_fn_with_state(
            Resource::ClientPortal,
            require_capability,
        ));

    staff.merge(portal)
}

#[derive(Debug, Deserialize)]
struct ProjectListQuery {
    status: Option<ProjectStatus>,
}

#[derive(Debug, Deserialize)]
struct CreateProjectRequest {
    customer_name: String,
    vehicle: Vehicle,
    promised_date: Option<DateTime<Utc>>,
    template_id: Option<String>,
    #[serde(default)]
    total_quoted: f64,
}

#[derive(Debug, Deserialize)]
struct UpdateProjectRequest {
    customer_name: Option<String>,
    vehicle: Option<Vehicle>,
    promised_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ChangeStatusRequest {
    status: ProjectStatus,
    hold_reason: Option<HoldReason>,
}

#[derive(Debug, Deserialize)]
struct TimelineRequest {
    update: String,
    category: String,
}

#[derive(Debug, Deserialize)]
struct MediaRequest {
    url: String,
    #[serde(default)]
    caption: String,
    category: String,
    #[serde(default)]
    is_featured: bool,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    author: String,
    text: String,
    #[serde(default = "default_visibility")]
    visible_to: Visibility,
}

fn default_visibility() -> Visibility {
    Visibility::All
}

/// List row for the project board.
#[derive(Debug, Serialize)]
pub struct ProjectOverview {
    pub id: String,
    pub customer_name: String,
    pub vehicle: String,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_reason: Option<HoldReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promised_date: Option<DateTime<Utc>>,
    pub progress: f64,
    pub awaiting_client: usize,
}

impl From<&Project> for ProjectOverview {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            customer_name: project.customer_name.clone(),
            vehicle: project.vehicle.display_name(),
            status: project.status,
            hold_reason: project.hold_reason,
            promised_date: project.promised_date,
            progress: overall_progress(project),
            awaiting_client: project
                .sub_tasks()
                .filter(|task| task.awaits_client())
                .count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryProgress {
    pub category_id: String,
    pub name: String,
    pub weight: f64,
    pub progress: f64,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub progress: f64,
    pub category_progress: Vec<CategoryProgress>,
}

impl From<Project> for ProjectDetail {
    fn from(project: Project) -> Self {
        let category_progress = project
            .categories
            .iter()
            .map(|category| CategoryProgress {
                category_id: category.id.clone(),
                name: category.name.clone(),
                weight: category.weight,
                progress: category_progress(category),
            })
            .collect();

        Self {
            progress: overall_progress(&project),
            category_progress,
            project,
        }
    }
}

/// The customer's project page. Parts, internal notes, hours and assignments
/// stay with the workshop.
#[derive(Debug, Serialize)]
pub struct ClientProjectView {
    pub id: String,
    pub customer_name: String,
    pub vehicle: Vehicle,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_reason: Option<HoldReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promised_date: Option<DateTime<Utc>>,
    pub progress: f64,
    pub categories: Vec<ClientCategoryView>,
    pub timeline: Vec<TimelineUpdate>,
    pub media: Vec<Media>,
    pub financials: Financials,
}

#[derive(Debug, Serialize)]
pub struct ClientCategoryView {
    pub id: String,
    pub name: String,
    pub progress: f64,
    pub tasks: Vec<ClientTaskView>,
}

#[derive(Debug, Serialize)]
pub struct ClientTaskView {
    pub id: String,
    pub name: String,
    pub status: SubTaskStatus,
    pub awaiting_decision: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_impact_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_prompt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decision_options: Vec<DecisionOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_image_url: Option<String>,
}

impl From<Project> for ClientProjectView {
    fn from(project: Project) -> Self {
        let progress = overall_progress(&project);
        let categories = project
            .categories
            .into_iter()
            .map(|category| ClientCategoryView {
                progress: category_progress(&category),
                id: category.id,
                name: category.name,
                tasks: category
                    .sub_tasks
                    .into_iter()
                    .map(|task| ClientTaskView {
                        awaiting_decision: task.awaits_client(),
                        id: task.id,
                        name: task.name,
                        status: task.status,
                        price_impact: task.price_impact,
                        eta_impact_days: task.eta_impact_days,
                        decision_prompt: task.decision_prompt,
                        decision_options: task.decision_options,
                        before_image_url: task.before_image_url,
                        after_image_url: task.after_image_url,
                    })
                    .collect(),
            })
            .collect();

        Self {
            id: project.id,
            customer_name: project.customer_name,
            vehicle: project.vehicle,
            status: project.status,
            hold_reason: project.hold_reason,
            promised_date: project.promised_date,
            progress,
            categories,
            timeline: project.timeline,
            media: project.media,
            financials: project.financials,
        }
    }
}

async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<ProjectOverview>>> {
    let projects = state.projects.list().await?;
    let overviews = projects
        .iter()
        .filter(|project| query.status.is_none_or(|status| project.status == status))
        .map(ProjectOverview::from)
        .collect();
    Ok(Json(overviews))
}

async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<ProjectDetail>> {
    let project = state.projects.get(&project_id).await?;
    Ok(Json(project.into()))
}

async fn get_client_view(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<ClientProjectView>> {
    let project = state.projects.get(&project_id).await?;
    Ok(Json(project.into()))
}

async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<ProjectDetail>)> {
    let customer_name = require_text("customer_name", &payload.customer_name)?;
    let vehicle = validated_vehicle(payload.vehicle)?;
    if !payload.total_quoted.is_finite() || payload.total_quoted < 0.0 {
        return Err(AppError::validation("total_quoted cannot be negative"));
    }

    let categories = match payload.template_id.as_deref() {
        Some(template_id) => state.templates.get(template_id).await?.instantiate(),
        None => Vec::new(),
    };

    let now = Utc::now();
    let mut project = Project {
        id: project_id_for(&vehicle),
        customer_name,
        status: ProjectStatus::Active,
        hold_reason: None,
        created_at: now,
        promised_date: payload.promised_date,
        categories,
        timeline: Vec::new(),
        media: Vec::new(),
        messages: Vec::new(),
        financials: Financials {
            total_quoted: payload.total_quoted,
            ..Financials::default()
        },
        vehicle,
    };
    project.push_timeline(timeline_entry(
        now,
        format!(
            "New project \"{}\" has been checked in.",
            project.vehicle.display_name()
        ),
        "Project Start",
    ));

    let project = state.projects.insert(project).await?;
    tracing::info!(project_id = %project.id, "project created");
    Ok((StatusCode::CREATED, Json(project.into())))
}

async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(payload): Json<UpdateProjectRequest>,
) -> AppResult<Json<ProjectDetail>> {
    if payload.customer_name.is_none()
        && payload.vehicle.is_none()
        && payload.promised_date.is_none()
    {
        return Err(AppError::validation("at least one field must be provided"));
    }

    let customer_name = payload
        .customer_name
        .as_deref()
        .map(|name| require_text("customer_name", name))
        .transpose()?;
    let vehicle = payload.vehicle.map(validated_vehicle).transpose()?;

    let project = state
        .projects
        .update(&project_id, |project| {
            if let Some(customer_name) = customer_name {
                project.customer_name = customer_name;
            }
            if let Some(vehicle) = vehicle {
                project.vehicle = vehicle;
            }
            if payload.promised_date.is_some() {
                project.promised_date = payload.promised_date;
            }
            Ok(())
        })
        .await?;
    Ok(Json(project.into()))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<StatusCode> {
    state.projects.delete(&project_id).await?;
    tracing::info!(%project_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(payload): Json<ChangeStatusRequest>,
) -> AppResult<Json<ProjectDetail>> {
    let update = match (payload.status, payload.hold_reason) {
        (ProjectStatus::OnHold, Some(reason)) => {
            format!("Project on hold. Reason: {}.", reason.label())
        }
        (ProjectStatus::OnHold, None) => {
            return Err(AppError::validation(
                "hold_reason is required when putting a project on hold",
            ));
        }
        (status, _) => format!("Project status changed to {}.", status.label()),
    };

    let now = Utc::now();
    let project = state
        .projects
        .update(&project_id, |project| {
            project.status = payload.status;
            project.hold_reason = match payload.status {
                ProjectStatus::OnHold => payload.hold_reason,
                _ => None,
            };
            project.push_timeline(timeline_entry(now, update, "Project Status"));
            Ok(())
        })
        .await?;

    tracing::info!(%project_id, status = ?project.status, "project status changed");
    Ok(Json(project.into()))
}

async fn add_timeline_update(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(payload): Json<TimelineRequest>,
) -> AppResult<(StatusCode, Json<TimelineUpdate>)> {
    let entry = timeline_entry(
        Utc::now(),
        require_text("update", &payload.update)?,
        &require_text("category", &payload.category)?,
    );

    let created = entry.clone();
    state
        .projects
        .update(&project_id, |project| {
            project.push_timeline(entry);
            Ok(())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn add_media(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(payload): Json<MediaRequest>,
) -> AppResult<(StatusCode, Json<Media>)> {
    let media = Media {
        id: new_id("media"),
        url: require_text("url", &payload.url)?,
        caption: payload.caption.trim().to_string(),
        category: require_text("category", &payload.category)?,
        is_featured: payload.is_featured,
    };

    let created = media.clone();
    state
        .projects
        .update(&project_id, |project| {
            if media.is_featured {
                for existing in &mut project.media {
                    existing.is_featured = false;
                }
            }
            project.media.push(media);
            Ok(())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Message>>> {
    let role = role_from_headers(&headers)?;
    let project = state.projects.get(&project_id).await?;
    let messages = project
        .messages
        .into_iter()
        .filter(|message| message.visible_to.allows(role))
        .collect();
    Ok(Json(messages))
}

async fn post_message(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<MessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = Message {
        id: new_id("msg"),
        author: require_text("author", &payload.author)?,
        author_role: role_from_headers(&headers)?,
        text: require_text("text", &payload.text)?,
        visible_to: payload.visible_to,
        created_at: Utc::now(),
    };

    let created = message.clone();
    state
        .projects
        .update(&project_id, |project| {
            project.messages.push(message);
            Ok(())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) fn timeline_entry(
    now: DateTime<Utc>,
    update: impl Into<String>,
    category: &str,
) -> TimelineUpdate {
    TimelineUpdate {
        id: new_id("tl"),
        date: now.date_naive(),
        update: update.into(),
        category: category.to_string(),
    }
}

fn validated_vehicle(vehicle: Vehicle) -> AppResult<Vehicle> {
    if vehicle.year <= 0 {
        return Err(AppError::validation("vehicle year must be positive"));
    }
    Ok(Vehicle {
        make: require_text("vehicle.make", &vehicle.make)?,
        model: require_text("vehicle.model", &vehicle.model)?,
        ..vehicle
    })
}

/// `<make>-<year>-<short uuid>`, with the make lowercased and hyphenated.
fn project_id_for(vehicle: &Vehicle) -> String {
    let make = vehicle
        .make
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    format!("{make}-{}-{}", vehicle.year, short_uuid())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use super::project_id_for;
    use crate::api::auth::ROLE_HEADER;
    use crate::api::testing::test_server;
    use crate::models::{Project, ProjectStatus, Vehicle};

    #[test]
    fn project_ids_embed_make_and_year() {
        let vehicle = Vehicle {
            make: "Alfa Romeo".to_string(),
            model: "Giulia".to_string(),
            year: 1967,
            vin: None,
            color: None,
            mileage_in: None,
            mileage_out: None,
        };
        assert!(project_id_for(&vehicle).starts_with("alfa-romeo-1967-"));
    }

    #[tokio::test]
    async fn lists_seeded_projects_with_progress() {
        let (_temp_dir, server) = test_server("list-projects").await;

        let response = server
            .get("/api/v1/projects")
            .add_header(ROLE_HEADER, "manager")
            .await;
        response.assert_status_ok();
        let projects: Vec<Value> = response.json();
        assert_eq!(projects.len(), 3);

        let charger = projects
            .iter()
            .find(|project| project["id"] == "charger-1968-chen")
            .expect("charger should be listed");
        assert_eq!(charger["progress"], json!(100.0));

        let completed: Vec<Value> = server
            .get("/api/v1/projects")
            .add_query_param("status", "completed")
            .add_header(ROLE_HEADER, "manager")
            .await
            .json();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn creates_a_project_from_a_template() {
        let (_temp_dir, server) = test_server("create-from-template").await;

        let response = server
            .post("/api/v1/projects")
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({
                "customer_name": "Ada Lovelace",
                "vehicle": {"make": "Porsche", "model": "911 S", "year": 1972},
                "template_id": "major-service",
                "total_quoted": 18000.0
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let project: Project = response.json();
        assert!(project.id.starts_with("porsche-1972-"));
        assert_eq!(project.categories.len(), 2);
        assert!(project.sub_tasks().all(|task| task.completed_at.is_none()));
        assert_eq!(project.timeline.len(), 1);
        assert_eq!(project.financials.total_quoted, 18000.0);
    }

    #[tokio::test]
    async fn rejects_blank_customer_and_unknown_template() {
        let (_temp_dir, server) = test_server("create-invalid").await;

        server
            .post("/api/v1/projects")
            .add_header(ROLE_HEADER, "boss")
            .json(&json!({
                "customer_name": "  ",
                "vehicle": {"make": "Ford", "model": "Bronco", "year": 1970}
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/api/v1/projects")
            .add_header(ROLE_HEADER, "boss")
            .json(&json!({
                "customer_name": "Grace Hopper",
                "vehicle": {"make": "Ford", "model": "Bronco", "year": 1970},
                "template_id": "no-such-template"
            }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn putting_on_hold_records_reason_in_timeline() {
        let (_temp_dir, server) = test_server("hold-project").await;

        server
            .post("/api/v1/projects/mustang-1969-smith/status")
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"status": "on_hold"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let project: Project = server
            .post("/api/v1/projects/mustang-1969-smith/status")
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"status": "on_hold", "hold_reason": "awaiting_parts"}))
            .await
            .json();
        assert_eq!(project.status, ProjectStatus::OnHold);
        assert_eq!(
            project.timeline[0].update,
            "Project on hold. Reason: Awaiting Parts."
        );

        let project: Project = server
            .post("/api/v1/projects/mustang-1969-smith/status")
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"status": "active", "hold_reason": "awaiting_parts"}))
            .await
            .json();
        assert!(project.hold_reason.is_none());
        assert_eq!(project.timeline[0].update, "Project status changed to Active.");
    }

    #[tokio::test]
    async fn boss_only_messages_are_hidden_from_managers() {
        let (_temp_dir, server) = test_server("messages").await;

        server
            .post("/api/v1/projects/camaro-1969-davis/messages")
            .add_header(ROLE_HEADER, "boss")
            .json(&json!({"author": "John", "text": "Margin is thin", "visible_to": "boss_only"}))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/v1/projects/camaro-1969-davis/messages")
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"author": "Sarah", "text": "Dash arrives Friday"}))
            .await
            .assert_status(StatusCode::CREATED);

        let manager_view: Vec<Value> = server
            .get("/api/v1/projects/camaro-1969-davis/messages")
            .add_header(ROLE_HEADER, "manager")
            .await
            .json();
        assert_eq!(manager_view.len(), 1);
        assert_eq!(manager_view[0]["author_role"], "manager");

        let boss_view: Vec<Value> = server
            .get("/api/v1/projects/camaro-1969-davis/messages")
            .add_header(ROLE_HEADER, "boss")
            .await
            .json();
        assert_eq!(boss_view.len(), 2);
    }

    #[tokio::test]
    async fn staff_messages_stay_off_the_client_page() {
        let (_temp_dir, server) = test_server("client-messages").await;

        server
            .post("/api/v1/projects/mustang-1969-smith/messages")
            .add_header(ROLE_HEADER, "manager")
            .json(&json!({"author": "Sarah", "text": "Chase the coilover supplier", "visible_to": "staff_only"}))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/v1/projects/mustang-1969-smith/messages")
            .add_header(ROLE_HEADER, "client")
            .json(&json!({"author": "John Smith", "text": "Any photos of the engine?"}))
            .await
            .assert_status(StatusCode::CREATED);

        let client_view: Vec<Value> = server
            .get("/api/v1/projects/mustang-1969-smith/messages")
            .add_header(ROLE_HEADER, "client")
            .await
            .json();
        assert_eq!(client_view.len(), 1);
        assert_eq!(client_view[0]["author_role"], "client");

        server
            .get("/api/v1/projects/mustang-1969-smith/messages")
            .add_header(ROLE_HEADER, "technician")
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn client_view_shows_decisions_without_workshop_detail() {
        let (_temp_dir, server) = test_server("client-view").await;

        let response = server
            .get("/api/v1/projects/mustang-1969-smith/client-view")
            .add_header(ROLE_HEADER, "client")
            .await;
        response.assert_status_ok();
        let view: Value = response.json();
        assert_eq!(view["financials"]["total_quoted"], json!(75000.0));

        let tasks: Vec<&Value> = view["categories"]
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|category| category["tasks"].as_array().into_iter().flatten())
            .collect();
        let awaiting: Vec<&str> = tasks
            .iter()
            .filter(|task| task["awaiting_decision"] == json!(true))
            .filter_map(|task| task["id"].as_str())
            .collect();
        assert_eq!(awaiting, vec!["bp5", "cs2"]);
        assert!(tasks.iter().all(|task| task.get("parts").is_none()
            && task.get("internal_notes").is_none()
            && task.get("assigned_to").is_none()));

        server
            .get("/api/v1/projects/mustang-1969-smith")
            .add_header(ROLE_HEADER, "client")
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deleting_a_project_removes_it() {
        let (_temp_dir, server) = test_server("delete-project").await;

        server
            .delete("/api/v1/projects/charger-1968-chen")
            .add_header(ROLE_HEADER, "boss")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get("/api/v1/projects/charger-1968-chen")
            .add_header(ROLE_HEADER, "boss")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
