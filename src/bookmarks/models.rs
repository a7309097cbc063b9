use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Core Bookmark Models
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bookmark {
    pub id: String,
    pub url: String,
    pub title: String,
    pub user_id: String,
    pub created_at: String,
}

// ============================================================================
// Request/Response Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookmarkRequest {
    pub title: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Change-Feed Message Models
// ============================================================================

/// Messages carried over a `/ws/bookmarks` subscription.
///
/// Server-to-client events mirror the row-level change feed: `insert`,
/// `update`, and `delete` for the bookmarks table, always scoped to the
/// connection's user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebSocketMessage {
    // Client → Server
    Ping,

    // Server → Client
    Connected {
        user_id: String,
    },
    Insert {
        bookmark: Bookmark,
    },
    Update {
        bookmark: Bookmark,
    },
    Delete {
        id: String,
    },
    /// The session behind this connection was signed out elsewhere
    SessionRevoked,
    Error {
        code: String,
        message: String,
    },
    Pong,
}
