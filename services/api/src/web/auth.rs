//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: provider listing, the OAuth login redirect and
//! callback, logout and the current-user lookup.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use document_browser_core::{AuthError, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

const AUTH_FAILED: &str = "Authentication failed, please try again";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ProviderResponse {
    /// Identifier used in the login and callback paths.
    pub id: String,
    pub name: String,
    pub login_url: String,
}

/// Query string the provider appends when redirecting back.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub provider: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
            provider: user.oauth_provider,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

/// Reads the session token from the `Cookie` header, if any.
pub fn session_token_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE, token, max_age_seconds, secure
    )
}

/// Maps a login failure to the status and message the client sees.
pub fn auth_error_response(e: AuthError) -> (StatusCode, String) {
    match e {
        AuthError::Configuration(msg) => (StatusCode::BAD_REQUEST, msg),
        AuthError::CsrfMismatch => {
            warn!("Rejected OAuth callback: state did not match a pending login");
            (StatusCode::UNAUTHORIZED, AUTH_FAILED.to_string())
        }
        AuthError::TokenExchange(reason) => {
            warn!("OAuth token exchange failed: {}", reason);
            (StatusCode::UNAUTHORIZED, AUTH_FAILED.to_string())
        }
        e @ AuthError::EmailConflict(_) => (StatusCode::CONFLICT, e.to_string()),
        AuthError::Port(e) => {
            error!("Login failed on a service port: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to complete login".to_string(),
            )
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /auth/providers - List the login options
#[utoipa::path(
    get,
    path = "/auth/providers",
    responses(
        (status = 200, description = "Configured OAuth providers", body = [ProviderResponse])
    )
)]
pub async fn providers_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let providers: Vec<ProviderResponse> = state
        .oauth
        .configured_providers()
        .into_iter()
        .map(|kind| ProviderResponse {
            id: kind.as_str().to_string(),
            name: kind.display_name().to_string(),
            login_url: format!("/auth/login/{}", kind.as_str()),
        })
        .collect();
    Json(providers)
}

/// GET /auth/login/{provider} - Redirect to the provider's consent screen
#[utoipa::path(
    get,
    path = "/auth/login/{provider}",
    params(("provider" = String, Path, description = "google, microsoft or github")),
    responses(
        (status = 303, description = "Redirect to the provider"),
        (status = 400, description = "Unknown or unconfigured provider")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let redirect = state
        .oauth
        .begin_login(&provider)
        .await
        .map_err(auth_error_response)?;
    Ok(Redirect::to(&redirect.url))
}

/// GET /auth/callback/{provider} - Finish the login and set the session cookie
#[utoipa::path(
    get,
    path = "/auth/callback/{provider}",
    params(
        ("provider" = String, Path, description = "google, microsoft or github"),
        CallbackParams
    ),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Unknown or unconfigured provider"),
        (status = 401, description = "Authentication failed"),
        (status = 409, description = "Email already registered through another provider"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let returned_state = params.state.unwrap_or_default();

    // 1. The user declined, or the provider failed: drop the transaction, skip the token call.
    if let Some(reason) = params.error {
        warn!(
            provider = %provider,
            error = %reason,
            description = params.error_description.as_deref().unwrap_or(""),
            "Provider returned an error to the callback"
        );
        state
            .oauth
            .abandon_login(&returned_state)
            .await
            .map_err(auth_error_response)?;
        return Err((StatusCode::UNAUTHORIZED, AUTH_FAILED.to_string()));
    }

    // 2. Validate state, redeem the code, upsert the user, issue a session.
    let authenticated = state
        .oauth
        .complete_login(
            &provider,
            &returned_state,
            params.code.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(auth_error_response)?;

    // 3. Hand the session to the browser.
    let cookie = session_cookie(
        &authenticated.session_token,
        state.sessions.ttl().num_seconds(),
        state.secure_cookies(),
    );
    let response = LoginResponse {
        user: authenticated.user.into(),
        expires_at: authenticated.expires_at,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(token) = session_token_from(&headers) {
        state.oauth.logout(&token).await.map_err(auth_error_response)?;
    }

    let cookie = session_cookie("", 0, state.secure_cookies());
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /auth/me - The signed-in user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn me_handler(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(user.into())
}
