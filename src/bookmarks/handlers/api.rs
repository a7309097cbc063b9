//! REST handlers for the bookmark store

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::auth::AuthedUser;
use crate::bookmarks::models::{Bookmark, CreateBookmarkRequest, MessageResponse};
use crate::bookmarks::services::BookmarkService;
use crate::bookmarks::validators::BookmarkValidator;
use crate::common::{ApiError, AppState, Validator};

/// GET /api/bookmarks
/// All bookmarks of the authenticated user, newest first
pub async fn list_bookmarks(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<Vec<Bookmark>>, ApiError> {
    let state = state_lock.read().await.clone();
    let service = BookmarkService::new(state.db, state.connection_manager);

    let bookmarks = service.list_for_user(&authed.id).await?;
    Ok(Json(bookmarks))
}

/// POST /api/bookmarks
/// Insert a bookmark owned by the authenticated user. Title and URL are
/// validated before any database work; the owner is never caller-supplied.
pub async fn create_bookmark(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<CreateBookmarkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let validation_result = BookmarkValidator.validate(&payload);
    if !validation_result.is_valid {
        warn!(
            user_id = %authed.id,
            errors = ?validation_result.error_messages(),
            "Bookmark rejected by validation"
        );
        return Err(ApiError::from(validation_result));
    }

    let state = state_lock.read().await.clone();
    let service = BookmarkService::new(state.db, state.connection_manager);

    let bookmark = service
        .create(&authed.id, &payload.title, &payload.url)
        .await?;

    Ok((StatusCode::CREATED, Json(bookmark)))
}

/// DELETE /api/bookmarks/:id
/// Delete one bookmark of the authenticated user. Someone else's bookmark
/// is indistinguishable from a missing one.
pub async fn delete_bookmark(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(bookmark_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let state = state_lock.read().await.clone();
    let service = BookmarkService::new(state.db, state.connection_manager);

    service.delete(&authed.id, &bookmark_id).await?;

    Ok(Json(MessageResponse {
        message: "Bookmark deleted".to_string(),
    }))
}
