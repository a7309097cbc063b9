use crate::bookmarks::handlers;
use axum::{
    routing::{delete, get},
    Router,
};

pub fn bookmarks_routes() -> Router {
    Router::new()
        // Change-feed subscription
        .route("/ws/bookmarks", get(handlers::websocket::feed_handler))
        // REST API routes
        .route(
            "/api/bookmarks",
            get(handlers::api::list_bookmarks).post(handlers::api::create_bookmark),
        )
        .route("/api/bookmarks/:id", delete(handlers::api::delete_bookmark))
}
