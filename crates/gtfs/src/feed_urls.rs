//! The static route→feed-URL table and the feed-URL→system mapping.
//!
//! Upstream does not publish this as data; every consumer of these feeds
//! hardcodes it, the same way `other_examples/.../mta-times` and
//! `.../nyc-subway-rs` hardcode per-route feed suffixes. Used both by the
//! loader (to populate `Stop::feed_urls`, §4.1 step 8) and by the
//! departure engine (to tag a fetched feed with its system, §4.4).

use model::transit::System;

/// Feed URLs are always read relative to a configured base URL; these are
/// the path suffixes appended to it.
pub fn feed_path_for_route(system: System, route_original_id: &str) -> Option<&'static str> {
    match system {
        System::Subway => subway_feed_for_route(route_original_id),
        System::Lirr => Some("nyct%2Fgtfs-lirr"),
        System::Mnr => Some("nyct%2Fgtfs-mnr"),
    }
}

fn subway_feed_for_route(route_original_id: &str) -> Option<&'static str> {
    match route_original_id {
        "A" | "C" | "E" => Some("nyct%2Fgtfs-ace"),
        "B" | "D" | "F" | "M" => Some("nyct%2Fgtfs-bdfm"),
        "G" => Some("nyct%2Fgtfs-g"),
        "J" | "Z" => Some("nyct%2Fgtfs-jz"),
        "N" | "Q" | "R" | "W" => Some("nyct%2Fgtfs-nqrw"),
        "L" => Some("nyct%2Fgtfs-l"),
        "1" | "2" | "3" | "4" | "5" | "6" | "7" | "GS" => Some("nyct%2Fgtfs"),
        "SI" => Some("nyct%2Fgtfs-si"),
        _ => None,
    }
}

/// The alert feed is consolidated across all three systems.
pub const ALERTS_FEED_PATH: &str = "camsys%2Fall-alerts";

/// Maps an alert `informed_entity.agency_id` to the system it belongs to.
/// Bus agencies (`MTABC`, `MTA NYCT` buses under a separate id) are not
/// one of the three aggregated systems and are skipped by the caller.
pub fn system_for_agency_id(agency_id: &str) -> Option<System> {
    match agency_id {
        "MTASBWY" | "MTANYCT" => Some(System::Subway),
        "MTALIRR" => Some(System::Lirr),
        "MTAMNR" => Some(System::Mnr),
        _ => None,
    }
}

/// Agency ids known to denote a bus system, skipped entirely by the
/// alert engine's route resolution (§4.5 step 3).
pub fn is_bus_agency(agency_id: &str) -> bool {
    matches!(agency_id, "MTABC" | "MTA NYCT Bus" | "MTABUS")
}

