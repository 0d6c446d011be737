//! The HTTP query surface: `/stations`, `/departures/{stationId}`,
//! `/alerts`, `/health`. Thin axum handlers over the engine crate; no
//! business logic lives here beyond query-parameter validation.

use std::sync::{Arc, RwLock};

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use engine::calendar::CalendarResolver;
use engine::config::Config;
use engine::feed_cache::FeedCache;
use gtfs::index::StaticIndex;

pub mod error;
pub mod routes;

/// Shared application state. The index sits behind a
/// `RwLock<Arc<StaticIndex>>`: the refresh task builds a whole new index
/// and swaps the `Arc` under a brief write lock; every request clones the
/// current `Arc` under a brief read lock and then operates lock-free.
#[derive(Clone)]
pub struct WebState {
    pub index: Arc<RwLock<Arc<StaticIndex>>>,
    pub feed_cache: Arc<FeedCache>,
    pub calendar_resolver: Arc<CalendarResolver>,
    pub config: Arc<Config>,
}

impl WebState {
    pub fn current_index(&self) -> Arc<StaticIndex> {
        self.index
            .read()
            .expect("static index lock poisoned")
            .clone()
    }
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/stations", get(routes::stations::list_stations))
        .route(
            "/departures/:station_id",
            get(routes::departures::list_departures),
        )
        .route("/alerts", get(routes::alerts::list_alerts))
        .route("/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_web_server(state: WebState) -> std::io::Result<()> {
    let bind_addr = state.config.bind_addr;
    let app = router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "listening");
    axum::serve(listener, app.into_make_service()).await
}
