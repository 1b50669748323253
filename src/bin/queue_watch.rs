//! Simulates a swiping client against a running server: keeps a local queue,
//! drops one item per swipe, and lets the refill loop top it up.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swipe_api::{
    config::RefillConfig,
    models::PoolItem,
    refill::{HttpItemFetcher, RefillController, RefillEvent, RefillSettings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("queue_watch=info,swipe_api=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RefillConfig::from_env()?;
    let settings = RefillSettings::from(&config);

    let http_client = reqwest::Client::builder()
        .timeout(settings.fetch_timeout)
        .build()?;
    let fetcher = HttpItemFetcher::new(http_client, &config.api_base_url, config.actor_id.clone());

    let (refill, mut events) = RefillController::spawn(Arc::new(fetcher), settings);

    tracing::info!(
        server = %config.api_base_url,
        actor = config.actor_id.as_deref().unwrap_or("anonymous"),
        threshold = settings.threshold,
        "Watching queue"
    );

    let mut queue: VecDeque<PoolItem> = VecDeque::new();
    let mut swipes = tokio::time::interval(Duration::from_millis(config.swipe_interval_ms));
    refill.observe_depth(queue.len());

    loop {
        tokio::select! {
            _ = swipes.tick() => {
                if let Some(item) = queue.pop_front() {
                    tracing::info!(
                        track_id = item.track_id,
                        name = %item.name,
                        artist = %item.artist_name,
                        depth = queue.len(),
                        "Swiped"
                    );
                    refill.observe_depth(queue.len());
                }
            }
            event = events.recv() => match event {
                Some(RefillEvent::Items(items)) => {
                    queue.extend(items);
                    tracing::info!(depth = queue.len(), "Queue refilled");
                    refill.observe_depth(queue.len());
                }
                Some(RefillEvent::Notice(message)) => {
                    tracing::warn!(depth = queue.len(), "{}", message);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    refill.shutdown().await;
    tracing::info!("Stopped watching queue");

    Ok(())
}
