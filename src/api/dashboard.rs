use axum::extract::State;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::access::Resource;
use crate::analytics::kpi::{workshop_kpis, WorkshopKpis};
use crate::api::auth::require_capability;
use crate::api::projects::ProjectOverview;
use crate::error::AppResult;
use crate::models::{Priority, ProjectStatus};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route_layer(middleware::from_fn_with_state(
            Resource::Dashboard,
            require_capability,
        ))
}

#[derive(Debug, Serialize)]
pub struct PendingDecision {
    pub project_id: String,
    pub project_name: String,
    pub task_id: String,
    pub task_name: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_impact: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub kpis: WorkshopKpis,
    pub active_projects: Vec<ProjectOverview>,
    pub awaiting_client: Vec<PendingDecision>,
    pub low_stock_items: usize,
}

async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardResponse>> {
    let projects = state.projects.list().await?;
    let shifts = state.shifts.list().await?;
    let inventory = state.inventory.list().await?;

    let awaiting_client = projects
        .iter()
        .flat_map(|project| {
            project
                .sub_tasks()
                .filter(|task| task.awaits_client())
                .map(move |task| PendingDecision {
                    project_id: project.id.clone(),
                    project_name: project.vehicle.display_name(),
                    task_id: task.id.clone(),
                    task_name: task.name.clone(),
                    priority: task.priority,
                    price_impact: task.price_impact,
                })
        })
        .collect();

    Ok(Json(DashboardResponse {
        kpis: workshop_kpis(&projects, &shifts, state.config.labor_rate),
        active_projects: projects
            .iter()
            .filter(|project| project.status != ProjectStatus::Completed)
            .map(ProjectOverview::from)
            .collect(),
        awaiting_client,
        low_stock_items: inventory.iter().filter(|item| item.is_low_stock()).count(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::auth::ROLE_HEADER;
    use crate::api::testing::test_server;

    #[tokio::test]
    async fn dashboard_summarizes_the_workshop() {
        let (_temp_dir, server) = test_server("dashboard").await;

        let dashboard: Value = server
            .get("/api/v1/dashboard")
            .add_header(ROLE_HEADER, "manager")
            .await
            .json();
        assert_eq!(dashboard["kpis"]["active_projects"], json!(2));
        assert_eq!(dashboard["kpis"]["on_time_delivery_rate"], json!(100.0));
        assert_eq!(dashboard["active_projects"].as_array().map(Vec::len), Some(2));
        assert_eq!(dashboard["awaiting_client"].as_array().map(Vec::len), Some(2));
        assert_eq!(dashboard["low_stock_items"], json!(3));

        server
            .get("/api/v1/dashboard")
            .add_header(ROLE_HEADER, "technician")
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
