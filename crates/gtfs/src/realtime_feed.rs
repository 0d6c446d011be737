//! Decodes a GTFS-Realtime `FeedMessage` into the flat shapes the engine
//! crate consumes, reading the NYCT/MTA Railroad extension fields
//! (plain fields at the extension's wire tag, see `protobuf/nyct-subway.proto`)
//! alongside the base message.
//!
//! Grounded on `realtime::update` for the decode-then-walk-entities shape,
//! simplified: this module has no database to resolve ids against, it just
//! hands back raw (still-original-id) data for the engine to interpret.

use prost::Message;

use crate::data_model::realtime::{
    self, nyct_trip_descriptor, trip_descriptor, trip_update::stop_time_update,
};
use crate::error::FeedDecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRelationship {
    Scheduled,
    Added,
    Unscheduled,
    Canceled,
    Skipped,
    NoData,
    Duplicated,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct RawStopTimeUpdate {
    pub stop_sequence: Option<u32>,
    pub stop_id: Option<String>,
    pub arrival_delay_secs: Option<i32>,
    pub arrival_time_unix: Option<i64>,
    pub departure_delay_secs: Option<i32>,
    pub departure_time_unix: Option<i64>,
    pub schedule_relationship: ScheduleRelationship,
    /// Track from either extension (scheduled or actual takes precedence
    /// for subway, the single MTA Railroad track field for LIRR/MNR).
    pub track: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RawTripUpdate {
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub start_date: Option<String>,
    pub direction_id: Option<u32>,
    pub schedule_relationship: ScheduleRelationship,
    pub nyct_direction: Option<String>,
    pub nyct_is_assigned: Option<bool>,
    pub mta_railroad_is_peak: Option<bool>,
    /// `TripUpdate.vehicle.label`. MNR publishes the static trip's
    /// identity here rather than in `trip_id` on some feed variants.
    pub vehicle_label: Option<String>,
    pub stop_time_updates: Vec<RawStopTimeUpdate>,
}

#[derive(Debug, Clone)]
pub struct RawActivePeriod {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct RawEntitySelector {
    pub agency_id: Option<String>,
    pub route_id: Option<String>,
    pub stop_id: Option<String>,
    pub trip_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RawAlert {
    pub id: String,
    pub header: Option<String>,
    pub description: Option<String>,
    pub active_periods: Vec<RawActivePeriod>,
    pub informed_entities: Vec<RawEntitySelector>,
}

fn schedule_relationship_from_trip(
    raw: trip_descriptor::ScheduleRelationship,
) -> ScheduleRelationship {
    match raw {
        trip_descriptor::ScheduleRelationship::Scheduled => ScheduleRelationship::Scheduled,
        trip_descriptor::ScheduleRelationship::Added => ScheduleRelationship::Added,
        trip_descriptor::ScheduleRelationship::Unscheduled => ScheduleRelationship::Unscheduled,
        trip_descriptor::ScheduleRelationship::Canceled => ScheduleRelationship::Canceled,
        trip_descriptor::ScheduleRelationship::Duplicated => ScheduleRelationship::Duplicated,
        trip_descriptor::ScheduleRelationship::Deleted => ScheduleRelationship::Deleted,
    }
}

fn schedule_relationship_from_stop(
    raw: stop_time_update::ScheduleRelationship,
) -> ScheduleRelationship {
    match raw {
        stop_time_update::ScheduleRelationship::Scheduled => ScheduleRelationship::Scheduled,
        stop_time_update::ScheduleRelationship::Skipped => ScheduleRelationship::Skipped,
        stop_time_update::ScheduleRelationship::NoData => ScheduleRelationship::NoData,
        stop_time_update::ScheduleRelationship::Unscheduled => ScheduleRelationship::Unscheduled,
    }
}

/// True if `bytes` decodes to a `FeedMessage` carrying at least one
/// entity. Used by the feed cache to detect a cached response that has
/// gone stale (upstream sometimes serves a well-formed but empty
/// message during a partial outage).
pub fn has_entities(bytes: &[u8]) -> bool {
    realtime::FeedMessage::decode(bytes)
        .map(|message| !message.entity.is_empty())
        .unwrap_or(false)
}

/// Decodes every trip update entity in `bytes`. Entities without a
/// `trip_update` are ignored; an entity's own malformed fields never
/// abort the whole feed, only the decode of the outer message can fail.
pub fn decode_trip_updates(bytes: &[u8]) -> Result<Vec<RawTripUpdate>, FeedDecodeError> {
    let message = realtime::FeedMessage::decode(bytes)?;
    let mut updates = Vec::new();
    for entity in message.entity {
        let Some(trip_update) = entity.trip_update else {
            continue;
        };
        let trip = trip_update.trip;
        let nyct = trip.nyct_trip_descriptor;
        let mta_railroad = trip.mta_railroad_trip_descriptor;
        let vehicle_label = trip_update.vehicle.and_then(|vehicle| vehicle.label);

        let stop_time_updates = trip_update
            .stop_time_update
            .into_iter()
            .map(|stop| {
                let track = stop
                    .mta_railroad_stop_time_update
                    .and_then(|ext| ext.track)
                    .or_else(|| {
                        stop.nyct_stop_time_update.and_then(|ext| {
                            ext.actual_track.or(ext.scheduled_track)
                        })
                    });
                RawStopTimeUpdate {
                    stop_sequence: stop.stop_sequence,
                    stop_id: stop.stop_id,
                    arrival_delay_secs: stop.arrival.as_ref().and_then(|e| e.delay),
                    arrival_time_unix: stop.arrival.as_ref().and_then(|e| e.time),
                    departure_delay_secs: stop.departure.as_ref().and_then(|e| e.delay),
                    departure_time_unix: stop.departure.as_ref().and_then(|e| e.time),
                    schedule_relationship: schedule_relationship_from_stop(
                        stop.schedule_relationship(),
                    ),
                    track,
                }
            })
            .collect();

        updates.push(RawTripUpdate {
            trip_id: trip.trip_id,
            route_id: trip.route_id,
            start_date: trip.start_date,
            direction_id: trip.direction_id,
            schedule_relationship: schedule_relationship_from_trip(trip.schedule_relationship()),
            nyct_direction: nyct.as_ref().and_then(|ext| ext.direction).map(|raw| {
                match nyct_trip_descriptor::Direction::from_i32(raw) {
                    Some(nyct_trip_descriptor::Direction::North) => "N".to_owned(),
                    Some(nyct_trip_descriptor::Direction::East) => "E".to_owned(),
                    Some(nyct_trip_descriptor::Direction::South) => "S".to_owned(),
                    Some(nyct_trip_descriptor::Direction::West) => "W".to_owned(),
                    None => "UNKNOWN".to_owned(),
                }
            }),
            nyct_is_assigned: nyct.as_ref().and_then(|ext| ext.is_assigned),
            mta_railroad_is_peak: mta_railroad.and_then(|ext| ext.is_peak),
            vehicle_label,
            stop_time_updates,
        });
    }
    Ok(updates)
}

/// Picks the "en-html" translation if present, else "en", else the first
/// translation in the list (upstream sometimes omits the language tag).
fn pick_translation(text: Option<realtime::TranslatedString>) -> Option<String> {
    let mut translations = text?.translation;
    let html_index = translations
        .iter()
        .position(|translation| translation.language.as_deref() == Some("en-html"));
    if let Some(index) = html_index {
        return Some(translations.swap_remove(index).text);
    }
    let en_index = translations
        .iter()
        .position(|translation| translation.language.as_deref() == Some("en"));
    if let Some(index) = en_index {
        return Some(translations.swap_remove(index).text);
    }
    translations.into_iter().next().map(|t| t.text)
}

/// Decodes every alert entity in `bytes`.
pub fn decode_alerts(bytes: &[u8]) -> Result<Vec<RawAlert>, FeedDecodeError> {
    let message = realtime::FeedMessage::decode(bytes)?;
    let mut alerts = Vec::new();
    for entity in message.entity {
        let Some(alert) = entity.alert else {
            continue;
        };
        let header = pick_translation(alert.header_text);
        let description = pick_translation(alert.description_text);
        let active_periods = alert
            .active_period
            .into_iter()
            .map(|period| RawActivePeriod {
                start: period.start.map(|v| v as i64),
                end: period.end.map(|v| v as i64),
            })
            .collect();
        let informed_entities = alert
            .informed_entity
            .into_iter()
            .map(|selector| RawEntitySelector {
                agency_id: selector.agency_id,
                route_id: selector.route_id,
                stop_id: selector.stop_id,
                trip_id: selector.trip.and_then(|trip| trip.trip_id),
            })
            .collect();
        alerts.push(RawAlert {
            id: entity.id,
            header,
            description,
            active_periods,
            informed_entities,
        });
    }
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;

    fn encode(message: &realtime::FeedMessage) -> Vec<u8> {
        message.encode_to_vec()
    }

    #[test]
    fn has_entities_is_false_for_an_empty_feed_message() {
        let message = realtime::FeedMessage {
            header: realtime::FeedHeader {
                gtfs_realtime_version: "2.0".to_owned(),
                ..Default::default()
            },
            entity: vec![],
        };
        assert!(!has_entities(&encode(&message)));
    }

    #[test]
    fn has_entities_is_true_once_an_entity_is_present() {
        let message = realtime::FeedMessage {
            header: realtime::FeedHeader {
                gtfs_realtime_version: "2.0".to_owned(),
                ..Default::default()
            },
            entity: vec![realtime::FeedEntity {
                id: "1".to_owned(),
                ..Default::default()
            }],
        };
        assert!(has_entities(&encode(&message)));
    }

    #[test]
    fn has_entities_is_false_for_garbage_bytes() {
        assert!(!has_entities(&[0xff, 0x00, 0x01]));
    }
}
