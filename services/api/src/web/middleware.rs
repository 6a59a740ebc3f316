//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::auth::session_token_from;
use crate::web::state::AppState;

/// Middleware that validates the session cookie and resolves the current user.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// If missing, expired or revoked, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Pull the session token out of the cookie header
    let token = session_token_from(req.headers());

    // 2. Validate it against the session store
    let status = state.sessions.validate(token.as_deref()).await.map_err(|e| {
        error!("Failed to validate auth session: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    // 3. Insert the user into request extensions
    let user = status.into_user().ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
