//! WebSocket event dispatch
//!
//! Handlers return the direct reply for the originating socket (if any);
//! room-wide effects go through `RoomRegistry::publish`. Errors are always
//! scoped to the offending socket, never broadcast.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::gateway::{ChatOptions, GatewayError, ImageOptions};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConversationId, Message, UserId};

/// Bind a socket to a conversation room, creating the conversation on miss.
///
/// Returns the `conversation-joined` reply plus the room subscription the
/// socket loop should poll.
pub async fn handle_join(
    state: &Arc<AppState>,
    conversation_id: Option<ConversationId>,
    user_id: Option<UserId>,
) -> (ServerMessage, broadcast::Receiver<ServerMessage>) {
    let conversation = state
        .sessions
        .get_or_create(conversation_id.as_deref(), user_id.as_deref())
        .await;
    let rx = state.rooms.join(&conversation.id).await;

    tracing::info!(
        "User {} joined conversation: {}",
        conversation.user_id,
        conversation.id
    );

    (ServerMessage::joined(&conversation), rx)
}

/// Handle client events and return an optional direct reply
pub async fn handle_message(msg: ClientMessage, state: &Arc<AppState>) -> Option<ServerMessage> {
    match msg {
        ClientMessage::JoinConversation {
            conversation_id,
            user_id,
        } => {
            // Joins are normally intercepted by the socket loop to capture the
            // room subscription; answering here keeps the dispatch total.
            let (reply, _rx) = handle_join(state, conversation_id, user_id).await;
            Some(reply)
        }

        ClientMessage::Message {
            message,
            conversation_id,
            model,
            temperature,
        } => handle_chat_message(state, conversation_id, message, model, temperature).await,

        ClientMessage::GenerateImage {
            prompt,
            conversation_id,
            size,
        } => handle_generate_image(state, conversation_id, prompt, size).await,

        ClientMessage::GetConversations => Some(ServerMessage::ConversationsList {
            conversations: state.sessions.list().await,
        }),
    }
}

/// Append the user message, broadcast it, and relay the assistant reply.
///
/// The conversation's send lock is held for the whole sequence so two
/// concurrent sends to one room resolve in submission order.
async fn handle_chat_message(
    state: &Arc<AppState>,
    conversation_id: ConversationId,
    text: String,
    model: Option<String>,
    temperature: Option<f32>,
) -> Option<ServerMessage> {
    let lock = state.send_lock(&conversation_id).await;
    let _guard = lock.lock().await;

    let user_message = Message::user(text);
    if state
        .sessions
        .append(&conversation_id, user_message.clone())
        .await
        .is_err()
    {
        return Some(ServerMessage::Error {
            message: "Conversation not found".to_string(),
            details: None,
        });
    }

    state
        .rooms
        .publish(&conversation_id, ServerMessage::Message(user_message))
        .await;
    state
        .rooms
        .publish(&conversation_id, ServerMessage::Typing { is_typing: true })
        .await;

    let Some(gateway) = state.gateway.clone() else {
        clear_typing(state, &conversation_id).await;
        return Some(ServerMessage::Error {
            message: "Failed to generate AI response".to_string(),
            details: Some("no AI gateway configured".to_string()),
        });
    };

    let Some(conversation) = state.sessions.get(&conversation_id).await else {
        clear_typing(state, &conversation_id).await;
        return Some(ServerMessage::Error {
            message: "Conversation not found".to_string(),
            details: None,
        });
    };

    let options = ChatOptions {
        model,
        temperature,
        max_tokens: None,
    };

    match gateway.complete(&conversation.messages, options).await {
        Ok(reply) => {
            if state
                .sessions
                .append(&conversation_id, reply.clone())
                .await
                .is_err()
            {
                clear_typing(state, &conversation_id).await;
                return Some(ServerMessage::Error {
                    message: "Conversation not found".to_string(),
                    details: None,
                });
            }

            state
                .rooms
                .publish(&conversation_id, ServerMessage::Message(reply))
                .await;
            clear_typing(state, &conversation_id).await;

            tracing::info!("AI response sent for conversation: {}", conversation_id);
            None
        }
        Err(err) => {
            tracing::error!("AI response error: {}", err);
            clear_typing(state, &conversation_id).await;
            Some(completion_error(err))
        }
    }
}

/// Generate an image and relay it to the room.
///
/// The image message is appended only if the conversation still exists; a
/// room that was swept mid-generation just drops the history entry.
async fn handle_generate_image(
    state: &Arc<AppState>,
    conversation_id: ConversationId,
    prompt: String,
    size: Option<String>,
) -> Option<ServerMessage> {
    let lock = state.send_lock(&conversation_id).await;
    let _guard = lock.lock().await;

    state
        .rooms
        .publish(
            &conversation_id,
            ServerMessage::ImageGenerating { is_generating: true },
        )
        .await;

    let Some(gateway) = state.gateway.clone() else {
        clear_generating(state, &conversation_id).await;
        return Some(ServerMessage::Error {
            message: "Failed to generate image".to_string(),
            details: Some("no AI gateway configured".to_string()),
        });
    };

    let options = ImageOptions {
        size,
        quality: None,
    };

    match gateway.generate_image(&prompt, options).await {
        Ok(image_message) => {
            let _ = state
                .sessions
                .append(&conversation_id, image_message.clone())
                .await;

            clear_generating(state, &conversation_id).await;
            state
                .rooms
                .publish(
                    &conversation_id,
                    ServerMessage::Message(image_message.clone()),
                )
                .await;

            Some(ServerMessage::ImageGenerated(image_message))
        }
        Err(err) => {
            tracing::error!("Image generation error: {}", err);
            clear_generating(state, &conversation_id).await;
            Some(image_error(err))
        }
    }
}

async fn clear_typing(state: &Arc<AppState>, conversation_id: &str) {
    state
        .rooms
        .publish(conversation_id, ServerMessage::Typing { is_typing: false })
        .await;
}

async fn clear_generating(state: &Arc<AppState>, conversation_id: &str) {
    state
        .rooms
        .publish(
            conversation_id,
            ServerMessage::ImageGenerating { is_generating: false },
        )
        .await;
}

fn completion_error(err: GatewayError) -> ServerMessage {
    match err {
        GatewayError::GeneratedEmpty => ServerMessage::Error {
            message: "No response generated".to_string(),
            details: None,
        },
        other => ServerMessage::Error {
            message: "Failed to generate AI response".to_string(),
            details: Some(other.to_string()),
        },
    }
}

fn image_error(err: GatewayError) -> ServerMessage {
    match err {
        GatewayError::GeneratedEmpty => ServerMessage::Error {
            message: "No image generated".to_string(),
            details: None,
        },
        other => ServerMessage::Error {
            message: "Failed to generate image".to_string(),
            details: Some(other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AiGateway, GatewayConfig, GatewayResult};
    use crate::types::MessageRole;
    use async_trait::async_trait;

    struct StubGateway;

    #[async_trait]
    impl AiGateway for StubGateway {
        async fn complete(
            &self,
            _history: &[Message],
            _options: ChatOptions,
        ) -> GatewayResult<Message> {
            Ok(Message::assistant(
                "hi there".to_string(),
                Some("stub-model".to_string()),
                None,
            ))
        }

        async fn generate_image(
            &self,
            prompt: &str,
            options: ImageOptions,
        ) -> GatewayResult<Message> {
            Ok(Message::image(
                prompt.to_string(),
                "data:image/png;base64,AAAA".to_string(),
                options.size.unwrap_or_else(|| "1024x1024".to_string()),
            ))
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn stub_state() -> Arc<AppState> {
        Arc::new(AppState::new_with_gateway(
            Some(Arc::new(StubGateway)),
            GatewayConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_message_to_unknown_conversation_is_scoped_error() {
        let state = stub_state();

        let reply = handle_message(
            ClientMessage::Message {
                message: "hello".to_string(),
                conversation_id: "ghost".to_string(),
                model: None,
                temperature: None,
            },
            &state,
        )
        .await;

        match reply {
            Some(ServerMessage::Error { message, .. }) => {
                assert_eq!(message, "Conversation not found");
            }
            other => panic!("expected error event, got {:?}", other),
        }
        assert_eq!(state.sessions.count().await, 0);
    }

    #[tokio::test]
    async fn test_message_appends_user_and_assistant() {
        let state = stub_state();
        state.sessions.get_or_create(Some("c1"), None).await;

        let reply = handle_message(
            ClientMessage::Message {
                message: "hello".to_string(),
                conversation_id: "c1".to_string(),
                model: None,
                temperature: None,
            },
            &state,
        )
        .await;

        assert!(reply.is_none());
        let conversation = state.sessions.get("c1").await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, MessageRole::User);
        assert_eq!(conversation.messages[1].role, MessageRole::Assistant);
        assert_eq!(
            conversation.messages[1].model.as_deref(),
            Some("stub-model")
        );
    }

    #[tokio::test]
    async fn test_message_without_gateway_clears_indicator() {
        let state = Arc::new(AppState::new());
        state.sessions.get_or_create(Some("c1"), None).await;
        let mut rx = state.rooms.join("c1").await;

        let reply = handle_message(
            ClientMessage::Message {
                message: "hello".to_string(),
                conversation_id: "c1".to_string(),
                model: None,
                temperature: None,
            },
            &state,
        )
        .await;

        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
        // user message, typing on, typing off, and nothing else
        assert!(matches!(rx.recv().await.unwrap(), ServerMessage::Message(_)));
        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::Typing { is_typing: true }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::Typing { is_typing: false }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_generate_image_echoes_and_broadcasts() {
        let state = stub_state();
        state.sessions.get_or_create(Some("c1"), None).await;
        let mut rx = state.rooms.join("c1").await;

        let reply = handle_message(
            ClientMessage::GenerateImage {
                prompt: "a red panda".to_string(),
                conversation_id: "c1".to_string(),
                size: None,
            },
            &state,
        )
        .await;

        let echoed = match reply {
            Some(ServerMessage::ImageGenerated(message)) => message,
            other => panic!("expected image-generated, got {:?}", other),
        };

        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::ImageGenerating { is_generating: true }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ServerMessage::ImageGenerating { is_generating: false }
        );
        assert_eq!(rx.recv().await.unwrap(), ServerMessage::Message(echoed));

        let conversation = state.sessions.get("c1").await.unwrap();
        assert_eq!(conversation.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_get_conversations_lists_summaries() {
        let state = stub_state();
        state.sessions.get_or_create(Some("c1"), Some("u1")).await;

        let reply = handle_message(ClientMessage::GetConversations, &state).await;

        match reply {
            Some(ServerMessage::ConversationsList { conversations }) => {
                assert_eq!(conversations.len(), 1);
                assert_eq!(conversations[0].id, "c1");
                assert_eq!(conversations[0].user_id, "u1");
            }
            other => panic!("expected conversations-list, got {:?}", other),
        }
    }
}
