use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use cinema_collab::catalog::Catalog;
use cinema_collab::channels::{Channel, CliChannel, TelegramChannel};
use cinema_collab::config::{self, BotConfig, ChannelKind};
use cinema_collab::conversation::ConversationEngine;
use cinema_collab::dispatcher::Dispatcher;
use cinema_collab::routes::{HealthState, health_routes};
use cinema_collab::store::{LibSqlBackend, ProfileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Initialize tracing: stderr always, plus a daily file when configured.
    // The guard must outlive main so buffered lines get flushed.
    let (file_layer, _log_guard) = match config::log_dir_from_env() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, "cinema-collab.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                ),
        )
        .with(file_layer.with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        ))
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🎬 Cinema Collab v{}", env!("CARGO_PKG_VERSION"));

    // ── Catalog ─────────────────────────────────────────────────────────
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_json_file(path)
            .with_context(|| format!("loading catalog from {}", path.display()))?,
        None => Catalog::default(),
    };
    eprintln!(
        "   Catalog: {} departments, {} experience bands",
        catalog.departments.len(),
        catalog.experience_bands.len()
    );

    // ── Database ────────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    let engine = Arc::new(ConversationEngine::new(store, Arc::new(catalog)));

    // ── Health endpoint ─────────────────────────────────────────────────
    if let Some(port) = config.health_port {
        let app = health_routes(HealthState {
            sessions: Arc::clone(engine.sessions()),
        });
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding health port {port}"))?;
        tokio::spawn(async move {
            tracing::info!(port, "Health server started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Health server stopped");
            }
        });
        eprintln!("   Health: http://0.0.0.0:{port}/health");
    }

    // Spawn session pruning task
    let sessions = Arc::clone(engine.sessions());
    let idle = config.session_idle.max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(idle);
        interval.tick().await; // Skip immediate first tick
        loop {
            interval.tick().await;
            let removed = sessions.prune_idle().await;
            if removed > 0 {
                tracing::debug!(removed, "Pruned idle sessions");
            }
        }
    });

    // ── Channel ─────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match config.channel {
        ChannelKind::Telegram => {
            let tg = config
                .telegram
                .clone()
                .context("telegram channel selected without telegram settings")?;
            let allowed = tg.allowed_users.join(", ");
            let channel = TelegramChannel::new(tg.bot_token, tg.allowed_users)
                .with_poll_timeout(tg.poll_timeout_secs);
            if let Err(e) = channel.health_check().await {
                tracing::warn!(error = %e, "Telegram getMe failed; polling anyway");
            }
            eprintln!("   Channel: telegram (allowed: {allowed})");
            Arc::new(channel)
        }
        ChannelKind::Cli => {
            eprintln!("   Channel: cli (prefix a payload with # to press a button)\n");
            Arc::new(CliChannel::new())
        }
    };

    let events = channel.start().await?;
    let dispatcher = Dispatcher::new(engine, Arc::clone(&channel), config.session_idle);
    dispatcher.run(events).await;

    channel.shutdown().await?;
    Ok(())
}
