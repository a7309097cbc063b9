//! Session and OAuth callback handlers

use axum::extract::{Extension, Query};
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::extractors::{AuthedUser, OptionalUser};
use super::models::{Claims, User};
use crate::bookmarks::models::WebSocketMessage;
use crate::common::{generate_user_id, safe_email_log, ApiError, AppState};
use crate::services::google::ProviderUser;

/// Name of the session cookie set by the OAuth callback
pub const SESSION_COOKIE: &str = "bm_session";

const SESSION_TTL_HOURS: i64 = 24;

/// Coarse error classification carried back to the login page as a query
/// parameter when the callback cannot produce a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackError {
    /// No authorization code in the callback request
    MissingCode,
    /// Exchange attempted but rejected by the provider
    ExchangeFailed,
}

impl CallbackError {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackError::MissingCode => "no-code",
            CallbackError::ExchangeFailed => "exchange-failed",
        }
    }
}

/// Redirect target for a failed callback
pub fn error_redirect(origin: &str, kind: CallbackError) -> String {
    format!("{}/?error={}", origin, kind.as_str())
}

/// Build the `Set-Cookie` value carrying a fresh session token
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        SESSION_TTL_HOURS * 3600
    )
}

/// Build the `Set-Cookie` value that expires the session cookie
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

/// Mint a session token for a user id
pub fn mint_session_token(jwt_secret: &str, user_id: &str) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::hours(SESSION_TTL_HOURS)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error = %e, user_id = %user_id, "JWT encoding error during session mint");
        ApiError::InternalServer("jwt error".to_string())
    })
}

/// Validate a session token and return its claims
/// Used by both the request extractor and the WebSocket handler
pub fn validate_session_token(jwt_secret: &str, token: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        warn!(error = %e, "Session token validation failed");
        ApiError::Unauthorized("invalid token".to_string())
    })?;

    Ok(token_data.claims)
}

/// GET /auth/login
/// Starts the provider flow: redirects the browser to Google's
/// authorization page, with this service's callback as the redirect target
pub async fn login_start(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await.clone();

    let redirect_uri = format!("{}/auth/callback", state.site_origin);
    let auth_url = state
        .google_service
        .authorization_url(&redirect_uri)
        .map_err(|e| {
            error!(error = %e, "Failed to build provider authorization URL");
            ApiError::ServiceUnavailable("sign-in provider not configured".to_string())
        })?;

    info!("Starting OAuth flow with redirect_uri: {}", redirect_uri);
    Ok(Redirect::to(&auth_url))
}

/// GET /auth/callback?code=<string>&next=<path>
///
/// Completes the authorization-code exchange. On success the response sets
/// the session cookie and redirects to `<origin><next>`; every failure is a
/// redirect to `<origin>/?error=<no-code|exchange-failed>`. No retry is
/// performed; the caller must re-initiate login.
pub async fn oauth_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = state_lock.read().await.clone();
    let next = params
        .get("next")
        .cloned()
        .unwrap_or_else(|| "/".to_string());

    let code = match params.get("code") {
        Some(code) => code,
        None => {
            warn!("OAuth callback without authorization code");
            return Redirect::to(&error_redirect(&state.site_origin, CallbackError::MissingCode))
                .into_response();
        }
    };

    // Must match the redirect_uri used in the authorization request
    let redirect_uri = format!("{}/auth/callback", state.site_origin);

    let tokens = match state.google_service.exchange_code(code, &redirect_uri).await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!(error = %e, "Authorization code exchange failed");
            return Redirect::to(&error_redirect(
                &state.site_origin,
                CallbackError::ExchangeFailed,
            ))
            .into_response();
        }
    };

    let identity = match state.google_service.fetch_user_info(&tokens.access_token).await {
        Ok(identity) => identity,
        Err(e) => {
            error!(error = %e, "Userinfo lookup failed after code exchange");
            return Redirect::to(&error_redirect(
                &state.site_origin,
                CallbackError::ExchangeFailed,
            ))
            .into_response();
        }
    };

    let user = match find_or_create_user(&state.db, &identity).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "User lookup failed during OAuth callback");
            return Redirect::to(&error_redirect(
                &state.site_origin,
                CallbackError::ExchangeFailed,
            ))
            .into_response();
        }
    };

    let token = match mint_session_token(&state.jwt_secret, &user.id) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "Session mint failed during OAuth callback");
            return Redirect::to(&error_redirect(
                &state.site_origin,
                CallbackError::ExchangeFailed,
            ))
            .into_response();
        }
    };

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "User signed in via OAuth callback"
    );

    let target = format!("{}{}", state.site_origin, next);
    (
        AppendHeaders([(SET_COOKIE, session_cookie(&token))]),
        Redirect::to(&target),
    )
        .into_response()
}

/// GET /api/session
/// Returns the current session snapshot. An anonymous request is a normal
/// `{"user": null}` answer, never an error, so clients can distinguish
/// "known unauthenticated" from "still loading".
pub async fn session_snapshot(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    OptionalUser(authed): OptionalUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let authed = match authed {
        Some(authed) => authed,
        None => return Ok(Json(serde_json::json!({ "user": null }))),
    };

    let state = state_lock.read().await.clone();

    // In dev mode, return the dev user directly without database lookup
    if state.dev_mode.is_enabled() {
        let dev_user = state.dev_mode.create_dev_user();
        return Ok(Json(serde_json::json!({ "user": dev_user })));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&authed.id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({ "user": user })))
}

/// POST /api/auth/logout
/// Clears the session cookie and pushes a `session_revoked` event to the
/// user's live feed connections so other open sessions observe the sign-out
pub async fn logout_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if let Err(e) = state
        .connection_manager
        .send_to_user(&authed.id, WebSocketMessage::SessionRevoked)
        .await
    {
        debug!(user_id = %authed.id, error = %e, "No live connections to notify on logout");
    }

    info!(user_id = %authed.id, "User signed out");

    let resp = serde_json::json!({
        "message": "Logout successful"
    });
    Ok((
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
        Json(resp),
    ))
}

// ---- Helper Functions ----

/// Find the local user for a provider identity, creating one on first login
async fn find_or_create_user(
    pool: &SqlitePool,
    identity: &ProviderUser,
) -> Result<User, ApiError> {
    let existing: Option<User> = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE provider = ? AND provider_id = ?",
    )
    .bind("google")
    .bind(&identity.id)
    .fetch_optional(pool)
    .await
    .map_err(ApiError::DatabaseError)?;

    if let Some(user) = existing {
        debug!(user_id = %user.id, "Found existing user for provider identity");
        return Ok(user);
    }

    let id = generate_user_id();
    info!(
        user_id = %id,
        email = %safe_email_log(&identity.email),
        "Creating new user account via OAuth"
    );

    sqlx::query(
        "INSERT OR IGNORE INTO users (id, email, name, avatar, provider, provider_id, created_at) VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
    )
    .bind(&id)
    .bind(&identity.email)
    .bind(identity.name.as_deref())
    .bind(identity.picture.as_deref())
    .bind("google")
    .bind(&identity.id)
    .execute(pool)
    .await
    .map_err(ApiError::DatabaseError)?;

    // A concurrent first login for the same identity may have won the
    // insert; fetch by provider identity rather than the id we generated
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE provider = ? AND provider_id = ?")
        .bind("google")
        .bind(&identity.id)
        .fetch_one(pool)
        .await
        .map_err(ApiError::DatabaseError)
}
