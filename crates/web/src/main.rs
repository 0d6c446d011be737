use std::sync::{Arc, RwLock};

use engine::calendar::CalendarResolver;
use engine::config::Config;
use engine::feed_cache::FeedCache;
use gtfs::index::StaticIndex;
use web::{start_web_server, WebState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("invalid or missing configuration");
    let config = Arc::new(config);

    let initial_index =
        gtfs::index::load(&config.static_root).expect("could not load static data at startup");
    let index = Arc::new(RwLock::new(Arc::new(initial_index)));

    let feed_cache = Arc::new(FeedCache::new());
    let calendar_resolver = Arc::new(CalendarResolver::new());

    spawn_refresh_task(index.clone(), calendar_resolver.clone(), config.clone());

    let state = WebState {
        index,
        feed_cache,
        calendar_resolver,
        config,
    };

    if let Err(err) = start_web_server(state).await {
        tracing::error!(error = %err, "web server exited with an error");
    }
}

/// The ambient "background timer" §2/§10 treats as external: a plain
/// interval loop that reloads the static corpus and atomically swaps the
/// published index, logging and keeping the old one on failure.
fn spawn_refresh_task(
    index: Arc<RwLock<Arc<StaticIndex>>>,
    calendar_resolver: Arc<CalendarResolver>,
    config: Arc<Config>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.refresh_interval);
        ticker.tick().await; // first tick fires immediately; startup already loaded once

        loop {
            ticker.tick().await;
            match gtfs::index::load(&config.static_root) {
                Ok(new_index) => {
                    *index.write().expect("static index lock poisoned") = Arc::new(new_index);
                    calendar_resolver.clear();
                    tracing::info!("static index refreshed");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "static data refresh failed, keeping previous index");
                }
            }
        }
    });
}
