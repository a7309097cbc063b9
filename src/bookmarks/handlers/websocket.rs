//! Change-feed subscription handler.
//!
//! One WebSocket subscription per mounted list view. The server pushes
//! insert/update/delete events for the bookmarks table, filtered to the
//! connection's user; closing the socket deregisters the connection and
//! aborts nothing else.

use crate::auth::handlers::validate_session_token;
use crate::common::error::ApiError;
use crate::common::helpers::safe_token_log;
use crate::common::id_generator::generate_connection_id;
use crate::common::state::AppState;
use crate::bookmarks::models::WebSocketMessage;
use crate::bookmarks::services::ConnectionManager;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// WebSocket upgrade handler for GET /ws/bookmarks?token=<jwt>
pub async fn feed_handler(
    ws: WebSocketUpgrade,
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    // DEV MODE: subscribe as the dev user without a token
    let user_id = if state.dev_mode.is_enabled() {
        state.dev_mode.create_dev_user().id
    } else {
        let token = params
            .get("token")
            .ok_or_else(|| ApiError::Unauthorized("Missing authentication token".to_string()))?;

        debug!(token = %safe_token_log(token), "Validating feed subscription token");
        let claims = validate_session_token(&state.jwt_secret, token)?;

        // The session must belong to a known user
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::DatabaseError)?;

        exists
            .map(|(id,)| id)
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?
    };

    info!(user_id = %user_id, "Feed subscription authenticated");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, state_lock)))
}

/// Drive one feed subscription until the client goes away
async fn handle_socket(socket: WebSocket, user_id: String, state_lock: Arc<RwLock<AppState>>) {
    let connection_id = generate_connection_id();

    info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "Feed connection established"
    );

    let state = state_lock.read().await.clone();
    let connection_manager = state.connection_manager.clone();

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Channel the feed writes into; the send task drains it to the socket
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    connection_manager
        .register(user_id.clone(), connection_id.clone(), tx.clone())
        .await;

    // Greet the subscriber with its own identity
    let connected_msg = WebSocketMessage::Connected {
        user_id: user_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        let _ = sender.send(Message::Text(json)).await;
    }

    // Send task: channel -> socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Receive task: socket -> heartbeat/ping handling
    let user_id_clone = user_id.clone();
    let connection_id_clone = connection_id.clone();
    let connection_manager_clone = connection_manager.clone();

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Err(e) = handle_message(
                msg,
                &user_id_clone,
                &connection_id_clone,
                &connection_manager_clone,
            )
            .await
            {
                error!(
                    user_id = %user_id_clone,
                    connection_id = %connection_id_clone,
                    error = %e,
                    "Error handling feed message"
                );

                let error_msg = WebSocketMessage::Error {
                    code: "MESSAGE_ERROR".to_string(),
                    message: e.to_string(),
                };
                let _ = connection_manager_clone
                    .send_to_connection(&connection_id_clone, error_msg)
                    .await;
            }
        }
    });

    // Whichever task finishes first ends the subscription
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    connection_manager.unregister(&connection_id).await;

    info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "Feed connection closed"
    );
}

/// Handle one inbound frame from a subscriber
async fn handle_message(
    msg: Message,
    user_id: &str,
    connection_id: &str,
    connection_manager: &ConnectionManager,
) -> Result<(), ApiError> {
    match msg {
        Message::Text(text) => {
            let ws_msg: WebSocketMessage = serde_json::from_str(&text)
                .map_err(|e| ApiError::BadRequest(format!("Invalid message format: {}", e)))?;

            match ws_msg {
                WebSocketMessage::Ping => {
                    connection_manager.update_heartbeat(connection_id).await;
                    connection_manager
                        .send_to_connection(connection_id, WebSocketMessage::Pong)
                        .await
                        .map_err(ApiError::InternalServer)?;
                }
                other => {
                    // The feed is server-push; clients only ever ping
                    warn!(
                        user_id = %user_id,
                        connection_id = %connection_id,
                        message = ?other,
                        "Unsupported client message on feed"
                    );
                    return Err(ApiError::BadRequest(
                        "Unsupported message on feed channel".to_string(),
                    ));
                }
            }
        }
        Message::Binary(_) => {
            warn!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Received unsupported binary message"
            );
            return Err(ApiError::BadRequest(
                "Binary messages not supported".to_string(),
            ));
        }
        Message::Ping(_) | Message::Pong(_) => {
            debug!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Heartbeat frame"
            );
            connection_manager.update_heartbeat(connection_id).await;
        }
        Message::Close(_) => {
            info!(
                user_id = %user_id,
                connection_id = %connection_id,
                "Received close message"
            );
        }
    }

    Ok(())
}
