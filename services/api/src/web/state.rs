//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chrono::Duration;
use document_browser_core::{
    AuthError, Clock, CommentService, DatabaseService, DocumentRegistry, OAuthController,
    OAuthHttpClient, PendingLoginStore, SessionStore,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub oauth: Arc<OAuthController>,
    pub comments: Arc<CommentService>,
    pub registry: Arc<DocumentRegistry>,
}

impl AppState {
    /// Wires the core services together around the given adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        http: Arc<dyn OAuthHttpClient>,
        pending: Arc<dyn PendingLoginStore>,
        clock: Arc<dyn Clock>,
        registry: DocumentRegistry,
    ) -> Result<Self, AuthError> {
        let sessions = Arc::new(SessionStore::new(
            db.clone(),
            clock.clone(),
            Duration::hours(config.session_ttl_hours),
        ));
        let oauth = OAuthController::new(
            config.providers.clone(),
            &config.redirect_base,
            pending,
            http,
            db.clone(),
            sessions.clone(),
            clock.clone(),
        )?;
        let comments = CommentService::new(db, clock);

        Ok(Self {
            config,
            sessions,
            oauth: Arc::new(oauth),
            comments: Arc::new(comments),
            registry: Arc::new(registry),
        })
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.config.redirect_base.starts_with("https://")
    }
}
