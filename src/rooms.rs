//! Per-conversation broadcast rooms.
//!
//! A room is a `tokio::sync::broadcast` channel named after a conversation
//! id; every socket joined to the conversation holds a receiver. Rooms with
//! no remaining receivers are pruned opportunistically on disconnect.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};

use crate::protocol::ServerMessage;
use crate::types::ConversationId;

const ROOM_CHANNEL_CAPACITY: usize = 100;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<ConversationId, broadcast::Sender<ServerMessage>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a conversation's room, creating the channel on first join
    pub async fn join(&self, conversation_id: &str) -> broadcast::Receiver<ServerMessage> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(conversation_id.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Broadcast to every socket in the room.
    ///
    /// A missing room or one with no receivers is a no-op, matching
    /// fire-and-forget room semantics.
    pub async fn publish(&self, conversation_id: &str, message: ServerMessage) {
        let rooms = self.rooms.read().await;
        if let Some(sender) = rooms.get(conversation_id) {
            // Ignore send errors (no receivers connected is fine)
            let _ = sender.send(message);
        }
    }

    pub async fn occupancy(&self, conversation_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms
            .get(conversation_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop rooms no socket is subscribed to anymore
    pub async fn prune(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        before - rooms.len()
    }
}
