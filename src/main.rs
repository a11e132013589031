use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use open_music_resolver::cache::{JsonFileBackend, LocalCacheStore};
use open_music_resolver::notifier::TracingNotifier;
use open_music_resolver::player::MemoryPlayer;
use open_music_resolver::sources::{
    parse_spotify_reference, LavalinkRestLoader, SpotifyHttpClient, YouTubeApiClient,
};
use open_music_resolver::storage::GuildSettingsStore;
use open_music_resolver::{
    AudioResolver, Config, FetchOptions, GuildId, Providers, RequestContext, SettingsProvider, SharedSettings,
    UserId,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_music_resolver=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Music Resolver v{}", env!("CARGO_PKG_VERSION"));

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        anyhow::bail!("Uso: open-music-resolver <consulta | URI de Spotify>");
    }

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Caché local y configuración de servidores
    let backend = JsonFileBackend::open(config.cache_dir()).await?;
    let guilds = GuildSettingsStore::open(config.guilds_dir()).await?;
    let settings = Arc::new(SharedSettings::new(config.resolver_settings(), guilds));

    let timeout = config.http_timeout();
    let providers = Providers {
        spotify: Arc::new(SpotifyHttpClient::new(
            config.spotify_client_id.clone(),
            config.spotify_client_secret.clone(),
            timeout,
        )?),
        youtube: Arc::new(YouTubeApiClient::new(config.youtube_api_key.clone(), timeout)?),
        loader: Arc::new(LavalinkRestLoader::new(
            &config.lavalink_host,
            config.lavalink_port,
            config.lavalink_password.clone(),
            timeout,
        )?),
    };

    let resolver = AudioResolver::new(providers, LocalCacheStore::new(Arc::new(backend)), settings.clone());
    let ctx = RequestContext::new(chrono::Utc::now().timestamp_millis() as u64, GuildId(0), UserId(0));
    let player = MemoryPlayer::new(ctx.guild_id);

    tokio::select! {
        result = resolve(&resolver, settings.as_ref(), &ctx, &player, &query) => {
            if let Err(e) = result {
                error!("❌ {}", e);
            }
            let flushed = resolver.flush(ctx.request_id).await;
            info!("💾 {} escrituras de caché completadas", flushed.len());
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("⚠️ Señal de shutdown recibida, cerrando...");
        }
    }

    resolver.shutdown().await;

    for (position, track) in player.all_tracks().iter().enumerate() {
        println!("{:>3}. {} - {} ({})", position + 1, track.author(), track.title(), track.uri());
    }
    Ok(())
}

async fn resolve(
    resolver: &AudioResolver,
    settings: &dyn SettingsProvider,
    ctx: &RequestContext,
    player: &MemoryPlayer,
    query: &str,
) -> open_music_resolver::Result<()> {
    let notifier = TracingNotifier;

    if let Some((query_type, id)) = parse_spotify_reference(query) {
        resolver
            .spotify_enqueue(ctx, query_type, &id, true, player, &notifier)
            .await?;
        return Ok(());
    }

    let result = resolver.fetch_track(ctx, query, FetchOptions::default()).await?;
    info!(
        "🔍 '{}': {:?} ({} tracks, API: {})",
        result.query,
        result.status(),
        result.tracks().len(),
        result.called_api
    );

    let guild = settings.guild(ctx.guild_id).await;
    if let Some(track) = result.tracks().first() {
        resolver.enqueue_track(ctx, player, &guild, track.clone()).await;
    }
    Ok(())
}
