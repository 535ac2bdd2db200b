//! In-memory session store: the process-wide table of active conversations.
//!
//! The store owns every `Conversation`; callers get clones and mutate only
//! through `append`. Cleanup is lazy: `sweep_idle` runs on socket
//! disconnect, never on a timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::{Conversation, ConversationId, ConversationSummary, Message, ANONYMOUS_USER};

/// Conversations idle longer than this are eligible for removal
pub const IDLE_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(ConversationId),
}

/// Cheaply cloneable handle to the conversation table
#[derive(Clone, Default)]
pub struct SessionStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the conversation for a known id, or insert a fresh one.
    ///
    /// A supplied id is kept even on miss so clients can pick their own
    /// conversation names; otherwise a ULID is allocated. Never fails.
    pub async fn get_or_create(
        &self,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Conversation {
        let mut conversations = self.conversations.write().await;

        if let Some(id) = conversation_id {
            if let Some(existing) = conversations.get(id) {
                return existing.clone();
            }
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: conversation_id
                .map(str::to_string)
                .unwrap_or_else(|| ulid::Ulid::new().to_string()),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_string(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        };
        conversations.insert(conversation.id.clone(), conversation.clone());

        tracing::debug!("Created conversation {}", conversation.id);
        conversation
    }

    pub async fn get(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    /// Append a message and refresh the activity timestamp.
    ///
    /// Broadcasting to room subscribers is the caller's responsibility.
    pub async fn append(&self, conversation_id: &str, message: Message) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;

        conversation.messages.push(message);
        conversation.last_activity = Utc::now();
        Ok(())
    }

    /// Remove every conversation idle longer than `max_idle`, returning the count removed
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        let mut conversations = self.conversations.write().await;
        let before = conversations.len();
        conversations.retain(|id, conversation| {
            let keep = now.signed_duration_since(conversation.last_activity) <= max_idle;
            if !keep {
                tracing::debug!("Cleaned up idle conversation: {}", id);
            }
            keep
        });
        before - conversations.len()
    }

    pub async fn ids(&self) -> Vec<ConversationId> {
        self.conversations.read().await.keys().cloned().collect()
    }

    /// Summaries of all conversations, oldest first
    pub async fn list(&self) -> Vec<ConversationSummary> {
        let conversations = self.conversations.read().await;
        let mut summaries: Vec<ConversationSummary> =
            conversations.values().map(Conversation::summary).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    pub async fn count(&self) -> usize {
        self.conversations.read().await.len()
    }

    /// Total messages held across all conversations
    pub async fn message_count(&self) -> usize {
        self.conversations
            .read()
            .await
            .values()
            .map(|c| c.messages.len())
            .sum()
    }
}
