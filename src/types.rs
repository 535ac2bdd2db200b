use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type ConversationId = String;
pub type MessageId = String;
pub type UserId = String;

/// Owner recorded for conversations joined without a user id
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Token counts reported by the upstream provider for a single completion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Message payload: plain text or a generated image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        text: String,
    },
    /// `image` is a data URI carrying the base64 payload, `size` a "WxH" descriptor
    Image {
        prompt: String,
        image: String,
        size: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    /// Model that produced this message (gateway output only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Message {
    /// Build a text message with the given role
    pub fn text(role: MessageRole, text: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            role,
            content: MessageContent::Text { text },
            timestamp: Utc::now(),
            model: None,
            usage: None,
        }
    }

    pub fn user(text: String) -> Self {
        Self::text(MessageRole::User, text)
    }

    /// Assistant reply as decoded from a gateway completion
    pub fn assistant(text: String, model: Option<String>, usage: Option<TokenUsage>) -> Self {
        Self {
            model,
            usage,
            ..Self::text(MessageRole::Assistant, text)
        }
    }

    /// Generated image wrapped as an assistant message
    pub fn image(prompt: String, image: String, size: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            role: MessageRole::Assistant,
            content: MessageContent::Image {
                prompt,
                image,
                size,
            },
            timestamp: Utc::now(),
            model: None,
            usage: None,
        }
    }
}

/// One conversation: an append-only message sequence plus ownership metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Listing entry for `conversations-list` (no message bodies)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub user_id: UserId,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_message_carries_provenance() {
        let usage = TokenUsage {
            prompt_tokens: 12,
            completion_tokens: 3,
            total_tokens: 15,
        };
        let msg = Message::assistant("hi".to_string(), Some("gpt-3.5-turbo".to_string()), Some(usage));

        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.model.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(msg.usage, Some(usage));
        assert!(matches!(msg.content, MessageContent::Text { ref text } if text == "hi"));
    }

    #[test]
    fn test_user_message_has_no_provenance() {
        let msg = Message::user("hello".to_string());

        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.model.is_none());
        assert!(msg.usage.is_none());
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_image_content_serializes_tagged() {
        let msg = Message::image(
            "a red panda".to_string(),
            "data:image/png;base64,AAAA".to_string(),
            "1024x1024".to_string(),
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["content"]["kind"], "image");
        assert_eq!(value["content"]["size"], "1024x1024");
        assert_eq!(value["role"], "assistant");
    }
}
