//! Domain types shared by the static loader, the departure/alert engines,
//! and the HTTP layer.
//!
//! Ids are namespaced per [`System`] (`system + separator + original id`,
//! see [`NamespacedId`]) because three independently-keyed upstreams are
//! reconciled into one address space. Realtime feeds only ever know the
//! original (unnamespaced) id, so every entity keeps both.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One of the three transit systems this service aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum System {
    Lirr,
    Mnr,
    Subway,
}

impl System {
    pub fn as_str(self) -> &'static str {
        match self {
            System::Lirr => "LIRR",
            System::Mnr => "MNR",
            System::Subway => "SUBWAY",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "LIRR" => Some(System::Lirr),
            "MNR" => Some(System::Mnr),
            "SUBWAY" => Some(System::Subway),
            _ => None,
        }
    }
}

/// The separator between a system tag and an original upstream id.
pub const NAMESPACE_SEPARATOR: &str = ":";

/// `system + separator + original id`. Never leaked as a bare original id
/// outside a scope that already knows which system it belongs to.
pub fn namespaced_id(system: System, original_id: &str) -> String {
    format!("{}{}{}", system.as_str(), NAMESPACE_SEPARATOR, original_id)
}

/// Splits a namespaced id back into its system and original-id parts.
pub fn split_namespaced_id(id: &str) -> Option<(System, &str)> {
    let (prefix, rest) = id.split_once(NAMESPACE_SEPARATOR)?;
    Some((System::from_str(prefix)?, rest))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    #[default]
    StopOrPlatform,
    Station,
    EntranceExit,
    GenericNode,
    BoardingArea,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    /// Namespaced primary key.
    pub id: String,
    /// Raw id as it appears in both the static corpus and realtime feeds.
    pub original_id: String,
    pub system: System,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Namespaced id of the parent station, if this stop is a platform.
    pub parent_id: Option<String>,
    pub location_type: LocationType,
    pub wheelchair_boarding: bool,
    /// Original ids of child stops (platforms), populated for stations.
    pub child_stop_ids: HashSet<String>,
    /// Original route ids served by this stop or any of its children.
    pub served_by_route_ids: HashSet<String>,
    /// Realtime feed URLs relevant to this stop, derived from
    /// `served_by_route_ids` through the static route-to-feed table.
    pub feed_urls: HashSet<String>,
    /// Named geographic region containing this stop, if the geo-lookup
    /// component resolved one at load time.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub original_id: String,
    pub system: System,
    pub agency_id: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub route_type: Option<i32>,
    pub color: Option<String>,
    pub text_color: Option<String>,
}

/// The direction_id convention from a static trip: 0/1, or unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StaticDirection {
    Zero,
    One,
    None,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// NOT namespaced: realtime feeds key trip updates by the raw trip id.
    pub id: String,
    pub system: System,
    pub route_id: String,
    pub service_id: String,
    pub headsign: Option<String>,
    pub short_name: Option<String>,
    pub direction_id: StaticDirection,
    /// `"0"`/`"1"`/absent, preserved verbatim per the static corpus.
    pub peak_offpeak: Option<String>,
    pub block_id: Option<String>,
    pub shape_id: Option<String>,
    pub wheelchair_accessible: bool,
    pub bikes_allowed: bool,
    /// Stop id (original, unnamespaced) of the max-stop_sequence stop-time
    /// for this trip, computed at load time.
    pub destination_stop_id: Option<String>,
}

impl Trip {
    pub fn is_peak(&self) -> bool {
        self.peak_offpeak.as_deref() == Some("1")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StopTimeEntry {
    pub arrival: Option<String>,
    pub departure: Option<String>,
    pub stop_sequence: u32,
    pub track: Option<String>,
}

/// The closed set of directions a departure can be tagged with. Kept as a
/// variant rather than a single string scheme: the three systems use
/// genuinely different vocabularies (compass points for subway, Inbound/
/// Outbound for commuter rail) and collapsing them loses information a
/// client may need to group departures correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    Inbound,
    Outbound,
    Unknown,
}

impl Direction {
    /// Ordering rank used by the departure engine's final sort: lower
    /// sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Direction::North => 1,
            Direction::South => 2,
            Direction::Inbound => 3,
            Direction::Outbound => 4,
            Direction::Unknown => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::Inbound => "Inbound",
            Direction::Outbound => "Outbound",
            Direction::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepartureSource {
    Realtime,
    Scheduled,
}

/// What filter was requested on `/departures/{stationId}` when selecting
/// which of the realtime/scheduled passes to honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    Realtime,
    Scheduled,
    Both,
}

impl Default for SourceFilter {
    fn default() -> Self {
        SourceFilter::Both
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub trip_id: String,
    pub route_id: String,
    pub system: System,
    pub direction: Direction,
    pub destination: Option<String>,
    pub destination_region: Option<String>,
    /// RFC3339 timestamp of the relevant (departure, or terminal arrival)
    /// time, absent only in states that should not normally be emitted.
    pub time: Option<String>,
    pub status: String,
    /// Minutes of delay; positive is late, negative is early.
    pub delay_minutes: Option<i64>,
    pub track: Option<String>,
    pub source: DepartureSource,
    pub is_terminal_arrival: bool,
    pub is_peak: bool,
    pub wheelchair_accessible: bool,
    pub bikes_allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePeriod {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub header: String,
    pub description: String,
    pub affected_lines: HashSet<String>,
    pub affected_stations: HashSet<String>,
    pub active_periods: Vec<ActivePeriod>,
    /// Human-readable labels for `affected_lines`/`affected_stations`, only
    /// populated when the caller asked for `includeLabels`.
    pub labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_and_splits_round_trip() {
        let id = namespaced_id(System::Subway, "L11");
        assert_eq!(id, "SUBWAY:L11");
        assert_eq!(split_namespaced_id(&id), Some((System::Subway, "L11")));
    }

    #[test]
    fn direction_rank_orders_compass_before_inbound_outbound() {
        assert!(Direction::North.rank() < Direction::Inbound.rank());
        assert!(Direction::Inbound.rank() < Direction::Unknown.rank());
    }
}
