pub mod data_model;
pub mod error;
pub mod feed_urls;
pub mod index;
pub mod realtime_feed;
pub mod static_data;
