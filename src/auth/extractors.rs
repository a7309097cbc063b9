//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::handlers::{validate_session_token, SESSION_COOKIE};
use super::models::User;
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated user extractor
///
/// Accepts a session token either as a `Bearer` Authorization header or as
/// the session cookie set by the OAuth callback.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
}

/// Pull the session token out of a `Cookie` header value
pub fn session_token_from_cookie_header(value: &str) -> Option<String> {
    value.split(';').find_map(|pair| {
        let (name, token) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE && !token.is_empty() {
            Some(token.to_string())
        } else {
            None
        }
    })
}

fn session_token(parts: &Parts) -> Option<String> {
    // Authorization header wins over the cookie when both are present
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string());

    if bearer.is_some() {
        return bearer;
    }

    parts
        .headers
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(session_token_from_cookie_header)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        // DEV MODE: Bypass authentication completely
        if app_state.dev_mode.is_enabled() {
            let dev_user = app_state.dev_mode.create_dev_user();

            debug!(
                user_id = %dev_user.id,
                email = %safe_email_log(&dev_user.email),
                "DEV MODE: Authentication bypassed"
            );

            return Ok(AuthedUser {
                id: dev_user.id,
                email: dev_user.email,
            });
        }

        let token = match session_token(parts) {
            Some(t) => t,
            None => {
                warn!("Authentication failed: no session token supplied");
                return Err(ApiError::Unauthorized("missing auth".into()));
            }
        };

        let claims = validate_session_token(&app_state.jwt_secret, &token)?;
        let user_id = claims.sub;

        // Look up user in database
        let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_optional(&app_state.db)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    user_id = %user_id,
                    "Database error during user lookup in authentication"
                );
                ApiError::DatabaseError(e)
            })?;

        match user {
            Some(u) => {
                debug!(
                    user_id = %u.id,
                    email = %safe_email_log(&u.email),
                    "User authentication successful via extractor"
                );
                Ok(AuthedUser {
                    id: u.id,
                    email: u.email,
                })
            }
            None => {
                warn!(user_id = %user_id, "Authentication failed: user not found in database");
                Err(ApiError::Unauthorized("user not found".into()))
            }
        }
    }
}

/// Like [`AuthedUser`] but never rejects: anonymous requests extract as
/// `OptionalUser(None)`. Used by the session snapshot endpoint, where
/// "unauthenticated" is an answer rather than an error.
#[derive(Debug)]
pub struct OptionalUser(pub Option<AuthedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthedUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalUser(Some(user))),
            Err(ApiError::DatabaseError(e)) => Err(ApiError::DatabaseError(e)),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}
