use std::sync::Arc;

use anyhow::Context;
use pvpsync::{
    app,
    config::Config,
    model::now_ms,
    store::{MemoryRoomStore, RoomStore, SqliteRoomStore},
    suggest::{OpenAiSuggester, SuggestionSource, Unconfigured},
    AppState, RoomService,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(dotenv::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()))
        })
        .context("invalid log filter")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn RoomStore> = match &config.database_url {
        Some(url) => Arc::new(SqliteRoomStore::connect(url).await?),
        None => {
            info!("DATABASE_URL not set, keeping rooms in memory");
            Arc::new(MemoryRoomStore::new())
        }
    };

    let suggester: Arc<dyn SuggestionSource> = match &config.openai_api_key {
        Some(key) => Arc::new(OpenAiSuggester::new(
            &config.openai_base_url,
            key,
            &config.suggest_model,
        )?),
        None => {
            warn!("OPENAI_API_KEY not set, reply suggestions are disabled");
            Arc::new(Unconfigured)
        }
    };

    let service = RoomService::new(store, suggester);
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_idle_rooms(service.clone(), config.clone(), shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Server running");

    let signal = shutdown.clone();
    axum::serve(listener, app(AppState { service }))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;
    Ok(())
}

/// Periodically forget rooms nobody has touched for `room_idle_ttl`.
async fn sweep_idle_rooms(service: RoomService, config: Config, shutdown: CancellationToken) {
    let ttl = config.room_idle_ttl.as_millis() as i64;
    let mut ticks = tokio::time::interval(config.sweep_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticks.tick() => {
                if let Err(e) = service.sweep_idle(now_ms() - ttl).await {
                    warn!(error = %e, "Idle room sweep failed");
                }
            }
        }
    }
}
