use crate::types::{Conversation, ConversationId, ConversationSummary, Message, UserId};
use serde::{Deserialize, Serialize};

/// Events accepted from connected sockets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Bind this socket to a conversation room, creating the conversation on miss
    JoinConversation {
        conversation_id: Option<ConversationId>,
        user_id: Option<UserId>,
    },
    /// Append a user message and request an assistant reply
    Message {
        message: String,
        conversation_id: ConversationId,
        model: Option<String>,
        temperature: Option<f32>,
    },
    GenerateImage {
        prompt: String,
        conversation_id: ConversationId,
        size: Option<String>,
    },
    GetConversations,
}

/// Events emitted to connected sockets, either directly or via a room broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    ConversationJoined {
        conversation_id: ConversationId,
        messages: Vec<Message>,
    },
    Message(Message),
    Typing {
        is_typing: bool,
    },
    ImageGenerating {
        is_generating: bool,
    },
    /// Echoed to the requesting socket only; the room sees the same payload as `message`
    ImageGenerated(Message),
    ConversationsList {
        conversations: Vec<ConversationSummary>,
    },
    /// Scoped to the offending socket, never broadcast
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl ServerMessage {
    /// Joined-room reply carrying the conversation history
    pub fn joined(conversation: &Conversation) -> Self {
        Self::ConversationJoined {
            conversation_id: conversation.id.clone(),
            messages: conversation.messages.clone(),
        }
    }
}
