pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod financials;
pub mod inventory;
pub mod projects;
pub mod schedule;
pub mod shifts;
pub mod tasks;
pub mod technicians;
pub mod templates;

use axum::http::HeaderMap;
use axum::middleware;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::access::{capabilities, Resource};
use crate::error::{AppError, AppResult};
use crate::models::UserRole;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me/capabilities", get(my_capabilities))
        .merge(projects::router())
        .merge(categories::router())
        .merge(tasks::router())
        .merge(financials::router())
        .merge(shifts::router())
        .merge(technicians::router())
        .merge(inventory::router())
        .merge(templates::router())
        .merge(schedule::router())
        .merge(dashboard::router())
}

/// Full application: versioned API behind the bearer check, plus an open health check.
pub fn app(state: AppState) -> Router {
    let api = router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_auth,
    ));

    Router::new()
        .nest("/api/v1", api)
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
}

pub async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    pub role: UserRole,
    pub capabilities: Vec<Resource>,
}

async fn my_capabilities(headers: HeaderMap) -> AppResult<Json<CapabilitiesResponse>> {
    let role = auth::role_from_headers(&headers)?;
    Ok(Json(CapabilitiesResponse {
        role,
        capabilities: capabilities(role),
    }))
}

/// Random identifier with a readable prefix, e.g. `inv-3f9a1c2e`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", short_uuid())
}

pub fn short_uuid() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

pub fn require_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use axum_test::TestServer;
    use tempfile::TempDir;

    use crate::api::app;
    use crate::config::Config;
    use crate::db;
    use crate::state::AppState;

    pub async fn test_server(name: &str) -> (TempDir, TestServer) {
        test_server_with(name, Config::default()).await
    }

    pub async fn test_server_with(name: &str, config: Config) -> (TempDir, TestServer) {
        let temp_dir = tempfile::tempdir().expect("tempdir should be created");
        let db_path = temp_dir.path().join(format!("{name}.db"));
        let config = Config {
            db_url: format!("sqlite://{}?mode=rwc", db_path.display()),
            ..config
        };

        let pool = db::connect_and_migrate(&config)
            .await
            .expect("database should initialize");
        let state = AppState::new(config, pool);
        let server = TestServer::new(app(state)).expect("test server should start");

        (temp_dir, server)
    }
}
