//! crates/document_browser_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

use crate::oauth::ProviderKind;

//=========================================================================================
// Identity
//=========================================================================================

/// An authenticated person, keyed by the (provider, subject) pair they logged in with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub oauth_provider: String,
    pub oauth_subject: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// The normalized identity claims returned by a provider's profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: ProviderKind,
    pub subject: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session is valid only while its expiry is strictly in the future.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A login that has been started but whose callback has not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub state: String,
    pub provider: ProviderKind,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

/// The result of a completed login: the user plus the freshly issued session.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Documents
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Html,
    Pdf,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Html => "html",
            DocumentKind::Pdf => "pdf",
        }
    }

    /// Parses the catalog/database spelling (`html` or `pdf`, case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(DocumentKind::Html),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }

    /// The MIME type used when serving the raw document bytes.
    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentKind::Html => "text/html; charset=utf-8",
            DocumentKind::Pdf => "application/pdf",
        }
    }
}

/// Catalog metadata for one browsable document. The bytes stay on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub date: String,
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub description: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub page_count: Option<u32>,
}

//=========================================================================================
// Comments
//=========================================================================================

/// A piece of feedback attached to a document, optionally anchored to an element in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub anchor: Option<String>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A comment joined with the display fields of its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentWithAuthor {
    pub comment: Comment,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentStats {
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

impl CommentStats {
    pub fn from_comments<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> Self {
        let mut stats = Self::default();
        for comment in comments {
            stats.total += 1;
            if comment.is_resolved {
                stats.resolved += 1;
            }
        }
        stats.unresolved = stats.total - stats.resolved;
        stats
    }
}
