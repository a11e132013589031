use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::info;

use crate::context::{GuildId, UserId};
use crate::error::TransportError;
use crate::sources::Track;

/// Largo máximo de cola en la que el resolver encola.
pub const MAX_QUEUE_LENGTH: usize = 10_000;

/// Reproductor de un servidor, visto desde el resolver.
#[async_trait]
pub trait Player: Send + Sync {
    fn guild_id(&self) -> GuildId;

    fn queue_len(&self) -> usize;

    fn add(&self, requester: UserId, track: Track);

    /// Si hay algo sonando.
    fn is_playing(&self) -> bool;

    /// Inicia el siguiente track de la cola.
    async fn play(&self) -> Result<(), TransportError>;

    fn shuffle_queue(&self);
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub track: Track,
    pub requested_by: UserId,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PlayerState {
    queue: VecDeque<QueueItem>,
    current: Option<QueueItem>,
}

/// Reproductor en memoria: cola FIFO y track actual.
#[derive(Debug)]
pub struct MemoryPlayer {
    guild_id: GuildId,
    state: Mutex<PlayerState>,
}

impl MemoryPlayer {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            state: Mutex::new(PlayerState::default()),
        }
    }

    pub fn queue(&self) -> Vec<QueueItem> {
        self.state.lock().queue.iter().cloned().collect()
    }

    pub fn current(&self) -> Option<QueueItem> {
        self.state.lock().current.clone()
    }

    /// Todos los tracks entregados al reproductor, primero el que suena.
    pub fn all_tracks(&self) -> Vec<Track> {
        let state = self.state.lock();
        state
            .current
            .iter()
            .chain(state.queue.iter())
            .map(|item| item.track.clone())
            .collect()
    }
}

#[async_trait]
impl Player for MemoryPlayer {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn add(&self, requester: UserId, track: Track) {
        info!("➕ Agregado a la cola: {}", track.title());
        self.state.lock().queue.push_back(QueueItem {
            track,
            requested_by: requester,
            added_at: Utc::now(),
        });
    }

    fn is_playing(&self) -> bool {
        self.state.lock().current.is_some()
    }

    async fn play(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.current = state.queue.pop_front();
        if let Some(item) = &state.current {
            info!("▶️ Reproduciendo: {}", item.track.title());
        } else {
            info!("📭 Cola vacía, no hay siguiente track");
        }
        Ok(())
    }

    fn shuffle_queue(&self) {
        let mut state = self.state.lock();
        let mut items: Vec<_> = state.queue.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        state.queue = items.into();
        info!("🔀 Cola mezclada");
    }
}
