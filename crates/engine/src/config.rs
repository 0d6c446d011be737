//! Runtime configuration, read once at startup from the environment.
//!
//! Shaped like `DatabaseConnectionInfo::from_env`: every setting is read
//! through `std::env::var`, but unlike that helper this surfaces *why* a
//! setting was missing or invalid rather than collapsing everything to
//! `None`, since an operator debugging a failed startup needs to know
//! which variable to fix.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|err| ConfigError::Invalid {
                name,
                value,
                reason: err.to_string(),
            }),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub timezone: chrono_tz::Tz,
    pub static_root: PathBuf,
    pub feed_base_url: String,
    pub cache_ttl_subway: Duration,
    pub cache_ttl_rail: Duration,
    pub cache_ttl_alerts: Duration,
    pub refresh_interval: Duration,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let timezone_name = env::var("TRANSIT_TIMEZONE").unwrap_or_else(|_| "America/New_York".to_owned());
        let timezone: chrono_tz::Tz =
            timezone_name
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    name: "TRANSIT_TIMEZONE",
                    value: timezone_name.clone(),
                    reason: "not a recognized IANA timezone name".to_owned(),
                })?;

        let static_root = PathBuf::from(required("TRANSIT_STATIC_ROOT")?);
        let feed_base_url = required("TRANSIT_FEED_BASE_URL")?;

        let cache_ttl_subway = optional_duration_secs("TRANSIT_CACHE_TTL_SUBWAY_SECS", 30)?;
        let cache_ttl_rail = optional_duration_secs("TRANSIT_CACHE_TTL_RAIL_SECS", 120)?;
        let cache_ttl_alerts = optional_duration_secs("TRANSIT_CACHE_TTL_ALERTS_SECS", 300)?;
        let refresh_interval =
            optional_duration_secs("TRANSIT_REFRESH_INTERVAL_SECS", 24 * 60 * 60)?;

        let bind_addr_raw =
            env::var("TRANSIT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let bind_addr = bind_addr_raw
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::Invalid {
                name: "TRANSIT_BIND_ADDR",
                value: bind_addr_raw,
                reason: err.to_string(),
            })?;

        Ok(Self {
            timezone,
            static_root,
            feed_base_url,
            cache_ttl_subway,
            cache_ttl_rail,
            cache_ttl_alerts,
            refresh_interval,
            bind_addr,
        })
    }
}
