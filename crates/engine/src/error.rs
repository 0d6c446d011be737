use thiserror::Error;

/// Failures fetching or decoding a realtime feed. Never surfaced directly
/// to an HTTP client: a feed error just means that pass falls back to
/// scheduled-only data.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetching {url}: upstream returned status {status}")]
    Status { url: String, status: u16 },
    #[error("fetching {url}: unexpected content type {content_type:?}")]
    UnexpectedContentType { url: String, content_type: String },
    #[error("fetching {url}: empty response body")]
    EmptyBody { url: String },
    #[error("decoding feed from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: gtfs::error::FeedDecodeError,
    },
}

/// Currently infallible: an unknown station id resolves to an empty
/// departure list (§4.4 "if missing, return empty"), never an error. Kept
/// as a named type so the engine's public signature still reads as
/// fallible at the seam a future failure mode (e.g. a feed URL whose
/// system can't be resolved) would use.
#[derive(Error, Debug)]
pub enum DepartureError {}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("fetching alerts feed: {0}")]
    Feed(#[from] FeedError),
}
