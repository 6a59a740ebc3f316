pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::rest::ApiDoc;
use crate::web::state::AppState;

/// Builds the full HTTP surface: public auth routes, session-protected routes and Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/providers", get(auth::providers_handler))
        .route("/auth/login/{provider}", get(auth::login_handler))
        .route("/auth/callback/{provider}", get(auth::callback_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/documents", get(rest::list_documents_handler))
        .route("/documents/selectors", get(rest::selectors_handler))
        .route("/documents/{name}/{date}", get(rest::get_document_handler))
        .route(
            "/documents/{name}/{date}/content",
            get(rest::document_content_handler),
        )
        .route(
            "/documents/{name}/{date}/comments",
            get(rest::list_comments_handler).post(rest::add_comment_handler),
        )
        .route(
            "/documents/{name}/{date}/comments/stats",
            get(rest::comment_stats_handler),
        )
        .route(
            "/comments/{id}",
            put(rest::edit_comment_handler).delete(rest::delete_comment_handler),
        )
        .route("/comments/{id}/resolve", post(rest::resolve_comment_handler))
        .route("/me/comments", get(rest::recent_comments_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
