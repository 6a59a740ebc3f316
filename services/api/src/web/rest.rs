//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the document and comment endpoints and the
//! master definition for the OpenAPI specification.

use crate::adapters::catalog;
use crate::web::auth::{self, LoginResponse, ProviderResponse, UserResponse};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use document_browser_core::comments::DEFAULT_RECENT_COMMENTS;
use document_browser_core::{
    Comment, CommentError, CommentStats, CommentWithAuthor, Document, DocumentRegistry,
    RegistryError, User,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::providers_handler,
        auth::login_handler,
        auth::callback_handler,
        auth::logout_handler,
        auth::me_handler,
        list_documents_handler,
        selectors_handler,
        get_document_handler,
        document_content_handler,
        list_comments_handler,
        add_comment_handler,
        comment_stats_handler,
        edit_comment_handler,
        delete_comment_handler,
        resolve_comment_handler,
        recent_comments_handler,
    ),
    components(
        schemas(
            ProviderResponse, LoginResponse, UserResponse, DocumentResponse, SelectorsResponse,
            CommentResponse, RecentCommentResponse, CommentStatsResponse, NewCommentRequest,
            EditCommentRequest
        )
    ),
    tags(
        (name = "Document Browser API", description = "OAuth login, document catalog and comments.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub name: String,
    pub date: String,
    /// `html` or `pdf`.
    pub document_type: String,
    pub description: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_count: Option<u32>,
    pub content_url: String,
}

impl From<&Document> for DocumentResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            name: doc.name.clone(),
            date: doc.date.clone(),
            document_type: doc.kind.as_str().to_string(),
            description: doc.description.clone(),
            title: doc.title.clone(),
            author: doc.author.clone(),
            page_count: doc.page_count,
            content_url: content_url(&doc.name, &doc.date),
        }
    }
}

/// Characters left alone inside a path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn content_url(name: &str, date: &str) -> String {
    format!(
        "/documents/{}/{}/content",
        utf8_percent_encode(name, PATH_SEGMENT),
        utf8_percent_encode(date, PATH_SEGMENT)
    )
}

/// Values for the name and date dropdowns.
#[derive(Serialize, ToSchema)]
pub struct SelectorsResponse {
    pub names: Vec<String>,
    /// Newest first.
    pub dates: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub anchor: Option<String>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub author_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            document_id: c.document_id,
            user_id: c.user_id,
            content: c.content,
            anchor: c.anchor,
            is_resolved: c.is_resolved,
            created_at: c.created_at,
            updated_at: c.updated_at,
            author_name: None,
            author_avatar_url: None,
        }
    }
}

impl From<CommentWithAuthor> for CommentResponse {
    fn from(c: CommentWithAuthor) -> Self {
        Self {
            author_name: Some(c.author_name),
            author_avatar_url: c.author_avatar_url,
            ..CommentResponse::from(c.comment)
        }
    }
}

/// A comment from the user's activity list, with the document it belongs to.
#[derive(Serialize, ToSchema)]
pub struct RecentCommentResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    /// `None` when the document has left the catalog.
    pub document_name: Option<String>,
    pub document_date: Option<String>,
}

impl RecentCommentResponse {
    fn new(comment: Comment, registry: &DocumentRegistry) -> Self {
        let document = registry.get_by_id(comment.document_id).ok();
        Self {
            document_name: document.map(|d| d.name.clone()),
            document_date: document.map(|d| d.date.clone()),
            comment: comment.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CommentStatsResponse {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

impl From<CommentStats> for CommentStatsResponse {
    fn from(s: CommentStats) -> Self {
        Self {
            total: s.total,
            resolved: s.resolved,
            unresolved: s.unresolved,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct NewCommentRequest {
    pub content: String,
    /// Id of the element in the document the comment refers to.
    pub anchor: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct EditCommentRequest {
    pub content: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentFilter {
    pub name: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SelectorFilter {
    /// Restrict dates to this document name.
    pub name: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentParams {
    pub limit: Option<u32>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn registry_error(e: RegistryError) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, e.to_string())
}

fn comment_error(e: CommentError) -> (StatusCode, String) {
    match e {
        e @ CommentError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        e @ CommentError::Permission(_) => (StatusCode::FORBIDDEN, e.to_string()),
        e @ CommentError::EmptyContent => (StatusCode::BAD_REQUEST, e.to_string()),
        CommentError::Port(e) => {
            error!("Comment operation failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process comment".to_string(),
            )
        }
    }
}

fn lookup<'a>(state: &'a AppState, name: &str, date: &str) -> Result<&'a Document, (StatusCode, String)> {
    state.registry.get(name, date).map_err(registry_error)
}

//=========================================================================================
// Document Handlers
//=========================================================================================

/// List catalog documents, optionally filtered by name and/or date.
#[utoipa::path(
    get,
    path = "/documents",
    params(DocumentFilter),
    responses(
        (status = 200, description = "Documents ordered by name, newest first", body = [DocumentResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DocumentFilter>,
) -> Json<Vec<DocumentResponse>> {
    let documents = state
        .registry
        .filter(filter.name.as_deref(), filter.date.as_deref())
        .into_iter()
        .map(DocumentResponse::from)
        .collect();
    Json(documents)
}

/// Names and dates for the document pickers.
#[utoipa::path(
    get,
    path = "/documents/selectors",
    params(SelectorFilter),
    responses(
        (status = 200, description = "Selector values", body = SelectorsResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn selectors_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SelectorFilter>,
) -> Json<SelectorsResponse> {
    let to_owned = |values: Vec<&str>| -> Vec<String> { values.into_iter().map(str::to_string).collect() };
    Json(SelectorsResponse {
        names: to_owned(state.registry.names()),
        dates: to_owned(state.registry.dates(filter.name.as_deref())),
    })
}

#[utoipa::path(
    get,
    path = "/documents/{name}/{date}",
    params(("name" = String, Path), ("date" = String, Path)),
    responses(
        (status = 200, description = "Document metadata", body = DocumentResponse),
        (status = 404, description = "No such document")
    )
)]
pub async fn get_document_handler(
    State(state): State<Arc<AppState>>,
    Path((name, date)): Path<(String, String)>,
) -> Result<Json<DocumentResponse>, (StatusCode, String)> {
    let document = lookup(&state, &name, &date)?;
    Ok(Json(document.into()))
}

/// The raw document, served as HTML or PDF.
#[utoipa::path(
    get,
    path = "/documents/{name}/{date}/content",
    params(("name" = String, Path), ("date" = String, Path)),
    responses(
        (status = 200, description = "Document bytes"),
        (status = 404, description = "No such document")
    )
)]
pub async fn document_content_handler(
    State(state): State<Arc<AppState>>,
    Path((name, date)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let document = lookup(&state, &name, &date)?;
    let bytes = catalog::read_content(document).await.map_err(|e| {
        error!(path = %document.path.display(), "Failed to read document content: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read document".to_string(),
        )
    })?;
    Ok(([(header::CONTENT_TYPE, document.kind.content_type())], bytes))
}

//=========================================================================================
// Comment Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/documents/{name}/{date}/comments",
    params(("name" = String, Path), ("date" = String, Path)),
    responses(
        (status = 200, description = "Comments in the order they were written", body = [CommentResponse]),
        (status = 404, description = "No such document")
    )
)]
pub async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Path((name, date)): Path<(String, String)>,
) -> Result<Json<Vec<CommentResponse>>, (StatusCode, String)> {
    let document = lookup(&state, &name, &date)?;
    let comments = state
        .comments
        .list_comments(document)
        .await
        .map_err(comment_error)?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/documents/{name}/{date}/comments",
    params(("name" = String, Path), ("date" = String, Path)),
    request_body = NewCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentResponse),
        (status = 400, description = "Empty comment"),
        (status = 404, description = "No such document")
    )
)]
pub async fn add_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path((name, date)): Path<(String, String)>,
    Json(req): Json<NewCommentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let document = lookup(&state, &name, &date)?;
    let comment = state
        .comments
        .add_comment(&user, document, &req.content, req.anchor.as_deref())
        .await
        .map_err(comment_error)?;

    let mut response = CommentResponse::from(comment);
    response.author_name = Some(user.name);
    response.author_avatar_url = user.avatar_url;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/documents/{name}/{date}/comments/stats",
    params(("name" = String, Path), ("date" = String, Path)),
    responses(
        (status = 200, description = "Comment counts", body = CommentStatsResponse),
        (status = 404, description = "No such document")
    )
)]
pub async fn comment_stats_handler(
    State(state): State<Arc<AppState>>,
    Path((name, date)): Path<(String, String)>,
) -> Result<Json<CommentStatsResponse>, (StatusCode, String)> {
    let document = lookup(&state, &name, &date)?;
    let stats = state
        .comments
        .comment_stats(document)
        .await
        .map_err(comment_error)?;
    Ok(Json(stats.into()))
}

#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = Uuid, Path)),
    request_body = EditCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Empty comment"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "No such comment")
    )
)]
pub async fn edit_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<EditCommentRequest>,
) -> Result<Json<CommentResponse>, (StatusCode, String)> {
    let comment = state
        .comments
        .edit_comment(id, &user, &req.content)
        .await
        .map_err(comment_error)?;
    Ok(Json(comment.into()))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = Uuid, Path)),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "No such comment")
    )
)]
pub async fn delete_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .comments
        .delete_comment(id, &user)
        .await
        .map_err(comment_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/comments/{id}/resolve",
    params(("id" = Uuid, Path)),
    responses(
        (status = 200, description = "Comment resolved", body = CommentResponse),
        (status = 403, description = "Not the author"),
        (status = 404, description = "No such comment")
    )
)]
pub async fn resolve_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommentResponse>, (StatusCode, String)> {
    let comment = state
        .comments
        .resolve_comment(id, &user)
        .await
        .map_err(comment_error)?;
    Ok(Json(comment.into()))
}

/// The signed-in user's latest comments across all documents.
#[utoipa::path(
    get,
    path = "/me/comments",
    params(RecentParams),
    responses(
        (status = 200, description = "Newest first", body = [RecentCommentResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn recent_comments_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<RecentCommentResponse>>, (StatusCode, String)> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_COMMENTS);
    let comments = state
        .comments
        .recent_comments(&user, limit)
        .await
        .map_err(comment_error)?;
    let registry = state.registry.as_ref();
    Ok(Json(
        comments
            .into_iter()
            .map(|c| RecentCommentResponse::new(c, registry))
            .collect(),
    ))
}
