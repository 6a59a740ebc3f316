//! crates/document_browser_core/src/session.rs
//!
//! Issues and checks the opaque session tokens that stand in for a completed login.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::domain::{Session, User};
use crate::ports::{DatabaseService, PortError, PortResult};
use crate::token::generate_token;

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Outcome of checking a session token. Not an error: anonymous callers are normal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated(User),
    Unauthenticated,
}

impl SessionStatus {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionStatus::Authenticated(user) => Some(user),
            SessionStatus::Unauthenticated => None,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            SessionStatus::Authenticated(user) => Some(user),
            SessionStatus::Unauthenticated => None,
        }
    }
}

pub struct SessionStore {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { db, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a new session for `user`. Earlier sessions of the same user stay valid.
    pub async fn issue(&self, user: &User) -> PortResult<Session> {
        let now = self.clock.now();
        let session = Session {
            token: generate_token(),
            user_id: user.id,
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.db.create_auth_session(&session).await?;
        debug!(user_id = %user.id, expires_at = %session.expires_at, "Issued session");
        Ok(session)
    }

    /// Resolves a token to its user.
    ///
    /// Absent, unknown and expired tokens all yield `Unauthenticated`. Expired sessions
    /// and sessions of deleted users are removed on the way.
    pub async fn validate(&self, token: Option<&str>) -> PortResult<SessionStatus> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(SessionStatus::Unauthenticated);
        };

        let Some(session) = self.db.find_auth_session(token).await? else {
            return Ok(SessionStatus::Unauthenticated);
        };

        if !session.is_valid_at(self.clock.now()) {
            debug!(user_id = %session.user_id, "Session expired; removing it");
            self.discard(token).await;
            return Ok(SessionStatus::Unauthenticated);
        }

        match self.db.get_user_by_id(session.user_id).await {
            Ok(user) if user.is_active => Ok(SessionStatus::Authenticated(user)),
            Ok(_) => Ok(SessionStatus::Unauthenticated),
            Err(PortError::NotFound(_)) => {
                self.discard(token).await;
                Ok(SessionStatus::Unauthenticated)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the session immediately. Unknown tokens are ignored.
    pub async fn revoke(&self, token: &str) -> PortResult<()> {
        self.db.delete_auth_session(token).await
    }

    /// Removes every session whose expiry has passed.
    pub async fn purge_expired(&self) -> PortResult<u64> {
        self.db.delete_expired_sessions(self.clock.now()).await
    }

    async fn discard(&self, token: &str) {
        // Cleanup is best effort; the caller is unauthenticated either way.
        if let Err(e) = self.db.delete_auth_session(token).await {
            warn!("Failed to remove stale session: {e}");
        }
    }
}
