use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swipe_api::{
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, PostgresStore},
    routes::create_router,
    services::{
        providers::{build_http_client, ArtistCatalogAdapter, ChartAdapter},
        spawn_sweeper, InMemoryRateLimiter,
    },
    state::{AppState, ServiceSettings},
};

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("swipe_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;
    let store = Arc::new(PostgresStore::new(db));

    let (cache, cache_writer) = Cache::new(create_redis_client(&config.redis_url)?);

    let http_client = build_http_client(config.adapter_timeout())?;
    let chart = Arc::new(ChartAdapter::new(
        http_client.clone(),
        config.chart_feed_url.clone(),
        config.catalog_api_url.clone(),
        config.chart_country.clone(),
        config.chart_limit,
    ));
    let artists = Arc::new(ArtistCatalogAdapter::new(
        http_client,
        cache,
        config.catalog_api_url.clone(),
        config.chart_country.clone(),
        config.seed_artists.clone(),
        config.artist_search_limit,
    ));

    let limiter = Arc::new(InMemoryRateLimiter::new());
    let sweeper = spawn_sweeper(
        limiter.clone(),
        Duration::from_secs(config.rate_limit_sweep_secs),
        Duration::from_secs(config.rate_limit_idle_ttl_secs),
    );

    let state = AppState::new(
        store.clone(),
        store,
        limiter,
        chart,
        artists,
        ServiceSettings::from_config(&config),
    );
    let app = create_router(state);

    let bind_address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown();
    cache_writer.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
