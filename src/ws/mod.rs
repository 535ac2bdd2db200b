pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection event loop.
///
/// A socket starts with no room; `join-conversation` binds it to exactly one
/// conversation room (a later join replaces the subscription). Room
/// broadcasts and inbound frames are interleaved by the select loop.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut room_rx: Option<broadcast::Receiver<ServerMessage>> = None;

    loop {
        tokio::select! {
            // Messages broadcast to the joined conversation room
            room_msg = async {
                match &mut room_rx {
                    Some(rx) => Some(rx.recv().await),
                    None => {
                        // Not joined yet: wait forever
                        std::future::pending::<Option<_>>().await
                    }
                }
            } => {
                match room_msg {
                    Some(Ok(msg)) => {
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        tracing::warn!("Socket lagged behind room broadcast, skipped {} messages", skipped);
                    }
                    Some(Err(broadcast::error::RecvError::Closed)) => {
                        room_rx = None;
                    }
                    None => {}
                }
            }

            // Frames from the client
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::JoinConversation { conversation_id, user_id }) => {
                                let (reply, rx) =
                                    handlers::handle_join(&state, conversation_id, user_id).await;
                                room_rx = Some(rx);

                                if let Ok(json) = serde_json::to_string(&reply) {
                                    if sender.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            tracing::error!("Failed to send response");
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    message: "Invalid message format".to_string(),
                                    details: Some(e.to_string()),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Opportunistic cleanup on disconnect
    drop(room_rx);
    let removed = state.run_idle_sweep().await;
    if removed > 0 {
        tracing::info!("Idle sweep removed {} conversations", removed);
    }
    tracing::info!("WebSocket connection closed");
}
