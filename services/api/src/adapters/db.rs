//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use document_browser_core::domain::{
    Comment, CommentWithAuthor, DocumentKind, OAuthProfile, Session, User,
};
use document_browser_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Unexpected`.
fn conflict_or_unexpected(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            PortError::Conflict(db_err.message().to_string())
        }
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, email, name, avatar_url, oauth_provider, oauth_subject, \
                            is_active, created_at, last_login_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    name: String,
    avatar_url: Option<String>,
    oauth_provider: String,
    oauth_subject: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            avatar_url: self.avatar_url,
            oauth_provider: self.oauth_provider,
            oauth_subject: self.oauth_subject,
            is_active: self.is_active,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    token: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            token: self.token,
            user_id: self.user_id,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

const COMMENT_COLUMNS: &str =
    "id, user_id, document_id, content, element_id, is_resolved, created_at, updated_at";

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    user_id: Uuid,
    document_id: Uuid,
    content: String,
    element_id: Option<String>,
    is_resolved: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}
impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            user_id: self.user_id,
            document_id: self.document_id,
            content: self.content,
            anchor: self.element_id,
            is_resolved: self.is_resolved,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CommentWithAuthorRecord {
    #[sqlx(flatten)]
    comment: CommentRecord,
    author_name: String,
    author_avatar_url: Option<String>,
}
impl CommentWithAuthorRecord {
    fn to_domain(self) -> CommentWithAuthor {
        CommentWithAuthor {
            comment: self.comment.to_domain(),
            author_name: self.author_name,
            author_avatar_url: self.author_avatar_url,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn upsert_oauth_user(
        &self,
        profile: &OAuthProfile,
        now: DateTime<Utc>,
    ) -> PortResult<User> {
        // Single statement: concurrent logins for one identity must not interleave a
        // read and a write. A returning user keeps the email they registered with, and
        // an email owned by another identity trips UNIQUE(email), mapped to Conflict.
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, email, name, avatar_url, oauth_provider, oauth_subject, \
             is_active, created_at, last_login_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7) \
             ON CONFLICT (oauth_provider, oauth_subject) DO UPDATE SET \
             name = excluded.name, avatar_url = excluded.avatar_url, \
             last_login_at = excluded.last_login_at \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.avatar_url)
        .bind(profile.provider.as_str())
        .bind(&profile.subject)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?;

        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(&self, session: &Session) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?;
        Ok(())
    }

    async fn find_auth_session(&self, token: &str) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT token, user_id, expires_at, created_at FROM sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn get_or_create_document(
        &self,
        name: &str,
        date: &str,
        file_path: &str,
        kind: DocumentKind,
        description: Option<&str>,
    ) -> PortResult<Uuid> {
        // The catalog is the source of truth, so an existing row takes the catalog's values.
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO documents (id, name, date, file_path, document_type, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (name, date) DO UPDATE SET \
                 file_path = excluded.file_path, \
                 document_type = excluded.document_type, \
                 description = excluded.description \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(date)
        .bind(file_path)
        .bind(kind.as_str())
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn insert_comment(&self, comment: &Comment) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO comments (id, user_id, document_id, content, element_id, is_resolved, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.document_id)
        .bind(&comment.content)
        .bind(&comment.anchor)
        .bind(comment.is_resolved)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_comment(&self, comment_id: Uuid) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"
        ))
        .bind(comment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Comment {} not found", comment_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn update_comment_content(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(&format!(
            "UPDATE comments SET content = ?1, updated_at = ?2 \
             WHERE id = ?3 AND user_id = ?4 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(content)
        .bind(updated_at)
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(CommentRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Comment {} not found", comment_id)))
    }

    async fn mark_comment_resolved(&self, comment_id: Uuid, user_id: Uuid) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(&format!(
            "UPDATE comments SET is_resolved = 1 \
             WHERE id = ?1 AND user_id = ?2 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record
            .map(CommentRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Comment {} not found", comment_id)))
    }

    async fn delete_comment(&self, comment_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?1 AND user_id = ?2")
            .bind(comment_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Comment {} not found", comment_id)));
        }
        Ok(())
    }

    async fn list_comments_for_document(
        &self,
        document_id: Uuid,
    ) -> PortResult<Vec<CommentWithAuthor>> {
        let records = sqlx::query_as::<_, CommentWithAuthorRecord>(
            "SELECT c.id, c.user_id, c.document_id, c.content, c.element_id, c.is_resolved, \
                    c.created_at, c.updated_at, \
                    u.name AS author_name, u.avatar_url AS author_avatar_url \
             FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.document_id = ?1 \
             ORDER BY c.created_at ASC, c.rowid ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let comments = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(comments)
    }

    async fn list_recent_comments_by_user(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE user_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let comments = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(comments)
    }
}
