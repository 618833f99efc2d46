//! WebSocket endpoint
//!
//! Clients connect with `GET /socket?token=<access token>`. Each connection
//! joins its user's room and receives JSON frames pushed through the hub.

use axum::{
    Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    error::ApiResult,
    middleware::{AuthUser, authenticate},
    realtime::{Membership, ServerEvent},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(socket_handler))
}

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

/// Frames clients may send
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
enum ClientEvent {
    #[serde(rename = "ping")]
    Ping,
}

/// Authenticate before upgrading so bad tokens get a plain 401
pub async fn socket_handler(
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let token = query.token.as_deref().unwrap_or_default();
    let user = authenticate(&state, token).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(state, user, socket)))
}

async fn set_presence(state: &AppState, user: AuthUser, is_online: bool) {
    match state
        .user_status_repository
        .set_online(user.id, is_online)
        .await
    {
        Ok(status) => {
            state.hub.broadcast(&ServerEvent::UserStatus(status)).await;
        }
        Err(e) => warn!("Could not update presence for {}: {}", user.id, e),
    }
}

async fn handle_client_frame(state: &AppState, membership: &Membership, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Ping) => {
            state
                .hub
                .emit_to_connection(membership, &ServerEvent::Pong)
                .await;
        }
        Err(e) => debug!("Ignoring frame from {}: {}", membership.user_id, e),
    }
}

async fn handle_socket(state: AppState, user: AuthUser, socket: WebSocket) {
    let (membership, mut rx) = state
        .hub
        .connect(user.id, || set_presence(&state, user, true))
        .await;
    info!("Socket {} opened for {}", membership.connection_id, user.id);

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = ws_tx.send(WsMessage::Text(frame)).await {
                debug!("Socket send failed: {}", e);
                break;
            }
        }
    });

    let reader_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_rx.next().await {
            match result {
                Ok(WsMessage::Text(text)) => {
                    handle_client_frame(&reader_state, &membership, &text).await;
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Socket error for {}: {}", membership.user_id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state
        .hub
        .disconnect(&membership, || set_presence(&state, user, false))
        .await;
    info!("Socket {} closed for {}", membership.connection_id, user.id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_frame_parses() {
        let event: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Ping));
    }

    #[test]
    fn test_unknown_frame_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"shout","data":1}"#).is_err());
    }
}
