//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use derecho_core::ports::PortError;
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Pulls the auth session id out of the `session` cookie, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_cookie(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let user_id = state
        .db
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized | PortError::NotFound(_) => StatusCode::UNAUTHORIZED,
            other => {
                error!("Failed to validate auth session: {:?}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
