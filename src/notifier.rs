use async_trait::async_trait;
use std::fmt;
use tracing::{info, warn};

/// Etapa del pipeline a la que se refiere un aviso de progreso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKey {
    Spotify,
    YouTube,
    Lavalink,
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProgressKey::Spotify => "spotify",
            ProgressKey::YouTube => "youtube",
            ProgressKey::Lavalink => "lavalink",
        })
    }
}

/// Avisos visibles para el usuario. Cada uno cierra el lote actual salvo `PlaylistEnqueued`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoSupportedReference,
    ConnectionReset,
    Timeout,
    TooManyFailures,
    NothingFound,
    PlaylistEnqueued { added: usize, not_queued: usize },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoSupportedReference => write!(f, "This doesn't seem to be a supported Spotify URL or code."),
            Notice::ConnectionReset => write!(f, "The connection was reset while loading the playlist."),
            Notice::Timeout => write!(f, "Player timeout, skipping remaining tracks."),
            Notice::TooManyFailures => write!(f, "Failing to get tracks, skipping remaining."),
            Notice::NothingFound => write!(f, "Nothing found."),
            Notice::PlaylistEnqueued { added, not_queued: 0 } => {
                write!(f, "Playlist Enqueued: added {} tracks to the queue.", added)
            }
            Notice::PlaylistEnqueued { added, not_queued } => write!(
                f,
                "Playlist Enqueued: added {} tracks to the queue. {} tracks cannot be queued.",
                added, not_queued
            ),
        }
    }
}

/// Canal de avisos hacia el usuario. Fire-and-forget desde el pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, current: usize, total: usize, key: ProgressKey);

    async fn show_notice(&self, notice: Notice);
}

/// Escribe progreso y avisos en el log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, current: usize, total: usize, key: ProgressKey) {
        info!("⏳ {}: {}/{}", key, current, total);
    }

    async fn show_notice(&self, notice: Notice) {
        match notice {
            Notice::PlaylistEnqueued { .. } => info!("✅ {}", notice),
            _ => warn!("⚠️ {}", notice),
        }
    }
}
