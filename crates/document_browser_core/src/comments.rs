//! crates/document_browser_core/src/comments.rs
//!
//! Comment operations on top of the `DatabaseService` port. Callers pass an already
//! validated `User`; this service only enforces ownership.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{Comment, CommentStats, CommentWithAuthor, Document, User};
use crate::ports::{DatabaseService, PortError};

pub const DEFAULT_RECENT_COMMENTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("Comment not found: {0}")]
    NotFound(Uuid),
    #[error("Only the author may change comment {0}")]
    Permission(Uuid),
    #[error("Comment content must not be empty")]
    EmptyContent,
    #[error("Service Port Error: {0}")]
    Port(PortError),
}

impl From<PortError> for CommentError {
    fn from(e: PortError) -> Self {
        CommentError::Port(e)
    }
}

pub struct CommentService {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
}

impl CommentService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn add_comment(
        &self,
        user: &User,
        document: &Document,
        content: &str,
        anchor: Option<&str>,
    ) -> Result<Comment, CommentError> {
        let content = normalized_content(content)?;
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id: user.id,
            document_id: document.id,
            content,
            anchor: anchor
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            is_resolved: false,
            created_at: self.clock.now(),
            updated_at: None,
        };
        self.db.insert_comment(&comment).await?;
        info!(comment_id = %comment.id, document = %document.name, "Comment added");
        Ok(comment)
    }

    pub async fn edit_comment(
        &self,
        comment_id: Uuid,
        user: &User,
        new_content: &str,
    ) -> Result<Comment, CommentError> {
        let content = normalized_content(new_content)?;
        self.owned_comment(comment_id, user).await?;
        let updated = self
            .db
            .update_comment_content(comment_id, user.id, &content, self.clock.now())
            .await
            .map_err(|e| not_found_as(e, comment_id))?;
        Ok(updated)
    }

    /// Marks the comment resolved. Resolving twice is harmless.
    pub async fn resolve_comment(&self, comment_id: Uuid, user: &User) -> Result<Comment, CommentError> {
        let comment = self.owned_comment(comment_id, user).await?;
        if comment.is_resolved {
            return Ok(comment);
        }
        let resolved = self
            .db
            .mark_comment_resolved(comment_id, user.id)
            .await
            .map_err(|e| not_found_as(e, comment_id))?;
        Ok(resolved)
    }

    pub async fn delete_comment(&self, comment_id: Uuid, user: &User) -> Result<(), CommentError> {
        self.owned_comment(comment_id, user).await?;
        self.db
            .delete_comment(comment_id, user.id)
            .await
            .map_err(|e| not_found_as(e, comment_id))?;
        info!(%comment_id, "Comment deleted");
        Ok(())
    }

    /// Comments on `document` in the order they were written.
    pub async fn list_comments(&self, document: &Document) -> Result<Vec<CommentWithAuthor>, CommentError> {
        Ok(self.db.list_comments_for_document(document.id).await?)
    }

    pub async fn comment_stats(&self, document: &Document) -> Result<CommentStats, CommentError> {
        let comments = self.list_comments(document).await?;
        Ok(CommentStats::from_comments(comments.iter().map(|c| &c.comment)))
    }

    /// The user's latest comments across documents, newest first.
    pub async fn recent_comments(&self, user: &User, limit: u32) -> Result<Vec<Comment>, CommentError> {
        Ok(self.db.list_recent_comments_by_user(user.id, limit).await?)
    }

    async fn owned_comment(&self, comment_id: Uuid, user: &User) -> Result<Comment, CommentError> {
        let comment = self
            .db
            .get_comment(comment_id)
            .await
            .map_err(|e| not_found_as(e, comment_id))?;
        if comment.user_id != user.id {
            return Err(CommentError::Permission(comment_id));
        }
        Ok(comment)
    }
}

fn normalized_content(content: &str) -> Result<String, CommentError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CommentError::EmptyContent);
    }
    Ok(content.to_string())
}

fn not_found_as(e: PortError, comment_id: Uuid) -> CommentError {
    match e {
        PortError::NotFound(_) => CommentError::NotFound(comment_id),
        other => CommentError::Port(other),
    }
}
