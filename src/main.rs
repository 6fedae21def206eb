//! Caption Clash backend entrypoint wiring REST, SSE, and the session store.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caption_clash_back::{
    config::AppConfig,
    dao::game_store::memory::InMemoryGameStore,
    routes,
    services::fanout::{EventBroker, LocalBroker},
    state::{AppState, SharedState},
};

/// Buffered events per fanout subscriber before laggards start skipping.
const EVENT_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;

    let broker = build_broker(&config).await?;
    let state = AppState::new(config, broker);

    bootstrap_store(&state).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Choose the fanout backend: the shared Redis channel when configured, the
/// in-process broadcaster otherwise. The engine never sees the difference.
async fn build_broker(config: &AppConfig) -> anyhow::Result<Arc<dyn EventBroker>> {
    #[cfg(feature = "redis-store")]
    if let Some(url) = &config.redis_url {
        use caption_clash_back::services::fanout::RedisBroker;

        let broker = RedisBroker::connect(url, EVENT_CAPACITY)
            .await
            .context("connecting event broker")?;
        info!("notification fanout backed by the shared Redis channel");
        return Ok(broker as Arc<dyn EventBroker>);
    }

    #[cfg(not(feature = "redis-store"))]
    if config.redis_url.is_some() {
        tracing::warn!(
            "REDIS_URL is set but the redis-store feature is disabled; using the in-process broker"
        );
    }

    info!("notification fanout running in-process");
    Ok(Arc::new(LocalBroker::new(EVENT_CAPACITY)))
}

/// Install the session store: a supervised Redis connection when configured,
/// the in-memory arena otherwise.
async fn bootstrap_store(state: &SharedState) {
    #[cfg(feature = "redis-store")]
    if let Some(url) = state.config().redis_url.clone() {
        use caption_clash_back::{
            dao::{
                game_store::{
                    GameStore,
                    redis::{RedisConfig, RedisGameStore},
                },
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        let ttl = state.config().game_ttl;
        let supervisor_state = state.clone();
        tokio::spawn(storage_supervisor::run(supervisor_state, move || {
            let config = RedisConfig::new(url.clone()).with_ttl(ttl);
            async move {
                let store = RedisGameStore::connect(config)
                    .await
                    .map_err(StorageError::from)?;
                Ok(Arc::new(store) as Arc<dyn GameStore>)
            }
        }));
        info!("session store backed by Redis");
        return;
    }

    state
        .install_game_store(Arc::new(InMemoryGameStore::new()))
        .await;
    info!("session store running in-memory");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
