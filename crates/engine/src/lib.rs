//! Reconciliation engine: turns a static index plus fetched realtime
//! feeds into the departure boards and alert lists the web layer serves.

pub mod alerts;
pub mod calendar;
pub mod config;
pub mod departures;
pub mod error;
pub mod feed_cache;
