//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/login` - Redirect to the provider authorization page
/// - `GET /auth/callback` - Complete the authorization-code exchange
/// - `GET /api/session` - Current session snapshot
/// - `POST /api/auth/logout` - Revoke the session
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/login", get(handlers::login_start))
        .route("/auth/callback", get(handlers::oauth_callback))
        .route("/api/session", get(handlers::session_snapshot))
        .route("/api/auth/logout", post(handlers::logout_handler))
}
