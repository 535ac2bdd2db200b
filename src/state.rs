use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

use crate::gateway::{AiGateway, GatewayConfig};
use crate::rooms::RoomRegistry;
use crate::session::{SessionStore, IDLE_WINDOW};
use crate::types::ConversationId;

/// Shared application state
///
/// Constructed once in `main` and passed to route and socket handlers as
/// `Arc<AppState>`; nothing here is process-global, so tests build their own.
pub struct AppState {
    pub sessions: SessionStore,
    pub rooms: RoomRegistry,
    pub gateway: Option<Arc<dyn AiGateway>>,
    pub gateway_config: GatewayConfig,
    /// One lock per conversation so concurrent sends resolve in submission order
    send_locks: RwLock<HashMap<ConversationId, Arc<Mutex<()>>>>,
    started_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self::new_with_gateway(None, GatewayConfig::default())
    }

    pub fn new_with_gateway(
        gateway: Option<Arc<dyn AiGateway>>,
        gateway_config: GatewayConfig,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            rooms: RoomRegistry::new(),
            gateway,
            gateway_config,
            send_locks: RwLock::new(HashMap::new()),
            started_at: Instant::now(),
        }
    }

    /// Mutual-exclusion handle for one conversation's send pipeline
    pub async fn send_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.send_locks.write().await;
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Lazy cleanup, run on socket disconnect rather than on a timer.
    ///
    /// Sweeps idle conversations, then drops locks for removed conversations
    /// and rooms nobody subscribes to anymore.
    pub async fn run_idle_sweep(&self) -> usize {
        let removed = self.sessions.sweep_idle(IDLE_WINDOW).await;
        if removed > 0 {
            let alive: HashSet<ConversationId> = self.sessions.ids().await.into_iter().collect();
            self.send_locks
                .write()
                .await
                .retain(|id, _| alive.contains(id));
        }
        self.rooms.prune().await;
        removed
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
