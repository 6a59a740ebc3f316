//! crates/document_browser_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or the
//! HTTP client used to talk to OAuth providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Comment, CommentWithAuthor, DocumentKind, OAuthProfile, PendingLogin, Session, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting record: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Relational storage for users, sessions, documents and comments.
///
/// Every method is expected to be atomic on its own; callers never need to
/// coordinate multiple calls to keep the store consistent.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---

    /// Inserts or refreshes the user identified by `(profile.provider, profile.subject)`.
    ///
    /// A new identity whose email already belongs to another user fails with
    /// `PortError::Conflict`. Existing users get name, avatar and last-login updated.
    async fn upsert_oauth_user(&self, profile: &OAuthProfile, now: DateTime<Utc>)
        -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    // --- Auth Sessions ---
    async fn create_auth_session(&self, session: &Session) -> PortResult<()>;

    async fn find_auth_session(&self, token: &str) -> PortResult<Option<Session>>;

    /// Deletes the session if present. Deleting an unknown token is not an error.
    async fn delete_auth_session(&self, token: &str) -> PortResult<()>;

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64>;

    // --- Document Management ---

    /// Returns the stable id of the `(name, date)` document, creating the row if needed.
    async fn get_or_create_document(
        &self,
        name: &str,
        date: &str,
        file_path: &str,
        kind: DocumentKind,
        description: Option<&str>,
    ) -> PortResult<Uuid>;

    // --- Comment Management ---
    async fn insert_comment(&self, comment: &Comment) -> PortResult<()>;

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment>;

    /// Rewrites the content of a comment owned by `user_id`. `NotFound` if no such row.
    async fn update_comment_content(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Comment>;

    async fn mark_comment_resolved(&self, comment_id: Uuid, user_id: Uuid) -> PortResult<Comment>;

    async fn delete_comment(&self, comment_id: Uuid, user_id: Uuid) -> PortResult<()>;

    /// All comments on a document in creation order.
    async fn list_comments_for_document(
        &self,
        document_id: Uuid,
    ) -> PortResult<Vec<CommentWithAuthor>>;

    /// The user's most recent comments across all documents, newest first.
    async fn list_recent_comments_by_user(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> PortResult<Vec<Comment>>;
}

/// Process-local storage for in-flight OAuth transactions, keyed by CSRF state.
#[async_trait]
pub trait PendingLoginStore: Send + Sync {
    async fn save(&self, pending: PendingLogin) -> PortResult<()>;

    /// Removes and returns the pending login for `state`. A second call returns `None`.
    async fn take(&self, state: &str) -> PortResult<Option<PendingLogin>>;

    /// Drops every pending login created before `cutoff`, returning how many were dropped.
    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> PortResult<usize>;
}

/// Everything needed to redeem an authorization code at a token endpoint.
#[derive(Debug, Clone)]
pub struct TokenRequest<'a> {
    pub token_url: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
}

/// The outbound HTTP calls the OAuth flow makes against a provider.
#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, request: TokenRequest<'_>) -> PortResult<String>;

    /// Performs an authenticated GET and returns the decoded JSON body.
    async fn fetch_json(&self, url: &str, access_token: &str) -> PortResult<serde_json::Value>;
}
