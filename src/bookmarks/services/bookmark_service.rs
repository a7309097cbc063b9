//! Bookmark persistence and change-feed publication.
//!
//! Every mutation commits first, then publishes its event to the owner's
//! feed connections. A failed publication never fails the mutation.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::feed::ConnectionManager;
use crate::bookmarks::models::{Bookmark, WebSocketMessage};
use crate::common::{generate_bookmark_id, ApiError};

pub struct BookmarkService {
    db: SqlitePool,
    feed: ConnectionManager,
}

impl BookmarkService {
    pub fn new(db: SqlitePool, feed: ConnectionManager) -> Self {
        Self { db, feed }
    }

    /// All bookmarks of a user, newest first. A user with no bookmarks gets
    /// an empty list, not an error.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Bookmark>, ApiError> {
        sqlx::query_as::<_, Bookmark>(
            "SELECT * FROM bookmarks WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::DatabaseError)
    }

    /// Insert a bookmark owned by `user_id` and publish the insert event
    pub async fn create(
        &self,
        user_id: &str,
        title: &str,
        url: &str,
    ) -> Result<Bookmark, ApiError> {
        let id = generate_bookmark_id();

        sqlx::query(
            r#"
            INSERT INTO bookmarks (id, url, title, user_id, created_at)
            VALUES (?, ?, ?, ?, datetime('now'))
            "#,
        )
        .bind(&id)
        .bind(url.trim())
        .bind(title.trim())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        let bookmark = sqlx::query_as::<_, Bookmark>("SELECT * FROM bookmarks WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.db)
            .await
            .map_err(ApiError::DatabaseError)?;

        info!(user_id = %user_id, bookmark_id = %id, "Bookmark created");

        self.publish(
            user_id,
            WebSocketMessage::Insert {
                bookmark: bookmark.clone(),
            },
        )
        .await;

        Ok(bookmark)
    }

    /// Delete a bookmark, but only when it belongs to `user_id`, and publish
    /// the delete event. A row that does not exist or is not the caller's is
    /// a NotFound either way.
    pub async fn delete(&self, user_id: &str, bookmark_id: &str) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = ? AND user_id = ?")
            .bind(bookmark_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Bookmark not found".to_string()));
        }

        info!(user_id = %user_id, bookmark_id = %bookmark_id, "Bookmark deleted");

        self.publish(
            user_id,
            WebSocketMessage::Delete {
                id: bookmark_id.to_string(),
            },
        )
        .await;

        Ok(())
    }

    /// Route an event to the owner's connections; delivery failure is logged
    /// and swallowed
    async fn publish(&self, user_id: &str, message: WebSocketMessage) {
        if let Err(e) = self.feed.send_to_user(user_id, message).await {
            debug!(user_id = %user_id, error = %e, "No feed delivery for event");
        }
    }
}
