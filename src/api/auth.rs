use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::access::{can_view, Resource};
use crate::error::{AppError, AppResult};
use crate::models::UserRole;
use crate::state::AppState;

/// Header carrying the caller's workshop role. Roles are asserted by the
/// client; there is no credential check behind them.
pub const ROLE_HEADER: &str = "x-workshop-role";

/// Header carrying the caller's user id, used to scope technicians to their own work.
pub const USER_HEADER: &str = "x-workshop-user";

pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> AppResult<Response> {
    let Some(configured_token) = state.config.token.as_deref() else {
        return Ok(next.run(request).await);
    };

    if configured_token.trim().is_empty() {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token);

    match provided {
        Some(value) if value == configured_token => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}

/// Route layer admitting a request only when its role may view `resource`.
pub async fn require_capability(
    State(resource): State<Resource>,
    request: Request<axum::body::Body>,
    next: Next,
) -> AppResult<Response> {
    let role = role_from_headers(request.headers())?;

    if !can_view(role, resource) {
        tracing::debug!(?role, ?resource, "capability denied");
        return Err(AppError::Forbidden(format!(
            "role {role:?} cannot access {resource:?}"
        )));
    }

    Ok(next.run(request).await)
}

pub fn role_from_headers(headers: &HeaderMap) -> AppResult<UserRole> {
    headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(UserRole::parse)
        .ok_or(AppError::Unauthorized)
}

pub fn user_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    if token.is_empty() {
        return None;
    }

    Some(token)
}
