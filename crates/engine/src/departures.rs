//! Builds the departure board for a single station: a realtime pass over
//! every feed relevant to the station, backfilled by a scheduled pass
//! over the static timetable for trips the realtime pass never saw.
//!
//! Grounded on `trip_instance.rs`'s instantiate-then-sort pattern (a
//! static schedule entry turned into a concrete, timestamped instance,
//! then ordered for display) and on `realtime::update`'s walk over feed
//! entities, generalized to reconcile three differently-keyed upstreams
//! instead of one.

use std::collections::{HashMap, HashSet};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;

use gtfs::index::StaticIndex;
use gtfs::realtime_feed::{self, RawStopTimeUpdate, RawTripUpdate, ScheduleRelationship};
use model::transit::{
    namespaced_id, Departure, DepartureSource, Direction, Route, SourceFilter, StaticDirection,
    System, Trip,
};

use crate::calendar::CalendarResolver;
use crate::config::Config;
use crate::error::DepartureError;
use crate::feed_cache::FeedCache;

/// The shared downtown terminal stop id MNR real-time feeds and the
/// static corpus both use; a trip ending or starting there is used both
/// to flag a terminal arrival and to infer direction when no static
/// `direction_id` is available.
const MNR_TERMINAL_STOP_ID: &str = "1";

/// Parses a GTFS `HH:MM:SS` time-of-service-day string, tolerating hours
/// at or beyond 24 (post-midnight trips that still belong to the prior
/// service day).
fn parse_service_time(value: &str) -> Option<Duration> {
    let mut parts = value.splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    Some(Duration::hours(hours) + Duration::minutes(minutes) + Duration::seconds(seconds))
}

/// Combines a service-day civil date with a possibly-24+-hour
/// `HH:MM:SS` string into an absolute instant; hours at or past 24 carry
/// into the following civil day automatically through `Duration`
/// addition, equivalent to reducing `HH` modulo 24 and advancing the date.
fn absolute_time(service_date: NaiveDate, value: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let offset = parse_service_time(value)?;
    let midnight = service_date.and_hms_opt(0, 0, 0)?;
    let naive = midnight + offset;
    tz.from_local_datetime(&naive).single()
}

fn cache_ttl(config: &Config, system: System) -> StdDuration {
    match system {
        System::Subway => config.cache_ttl_subway,
        System::Lirr | System::Mnr => config.cache_ttl_rail,
    }
}

/// Strips leading zeros from a raw trip id, the fallback MNR real-time
/// key projection when neither the vehicle label nor the short-name
/// index resolves a match. Never returns an empty string.
fn strip_leading_zeros(id: &str) -> &str {
    let stripped = id.trim_start_matches('0');
    if stripped.is_empty() {
        id
    } else {
        stripped
    }
}

struct ResolvedTrip<'a> {
    trip: Option<&'a Trip>,
    /// Every identifier projection under which this realtime trip update
    /// could later be matched by the scheduled backfill pass.
    processed_keys: Vec<String>,
}

/// Resolves the static trip a realtime trip update corresponds to.
/// SUBWAY and LIRR key by the raw trip id directly; MNR tries the
/// vehicle-label index, then the short-name index keyed on the realtime
/// trip id, then the raw trip id with leading zeros stripped.
fn resolve_static_trip<'a>(
    system: System,
    update: &RawTripUpdate,
    trips: Option<&'a HashMap<String, Trip>>,
    short_name_index: Option<&HashMap<String, String>>,
    vehicle_label_index: &HashMap<String, String>,
) -> ResolvedTrip<'a> {
    let raw_trip_id = update.trip_id.as_deref().unwrap_or_default();
    let stripped = strip_leading_zeros(raw_trip_id);
    let mut keys = vec![raw_trip_id.to_owned()];
    if stripped != raw_trip_id {
        keys.push(stripped.to_owned());
    }

    let Some(trips) = trips else {
        return ResolvedTrip {
            trip: None,
            processed_keys: keys,
        };
    };

    if system != System::Mnr {
        return ResolvedTrip {
            trip: trips.get(raw_trip_id),
            processed_keys: keys,
        };
    }

    if let Some(label) = &update.vehicle_label {
        if let Some(trip_id) = vehicle_label_index.get(label) {
            if let Some(trip) = trips.get(trip_id) {
                keys.push(label.clone());
                if let Some(short_name) = &trip.short_name {
                    keys.push(short_name.clone());
                }
                return ResolvedTrip {
                    trip: Some(trip),
                    processed_keys: keys,
                };
            }
        }
    }
    if let Some(index) = short_name_index {
        if let Some(trip_id) = index.get(raw_trip_id) {
            if let Some(trip) = trips.get(trip_id) {
                if let Some(short_name) = &trip.short_name {
                    keys.push(short_name.clone());
                }
                return ResolvedTrip {
                    trip: Some(trip),
                    processed_keys: keys,
                };
            }
        }
    }
    if let Some(trip) = trips.get(raw_trip_id).or_else(|| trips.get(stripped)) {
        if let Some(short_name) = &trip.short_name {
            keys.push(short_name.clone());
        }
        return ResolvedTrip {
            trip: Some(trip),
            processed_keys: keys,
        };
    }
    ResolvedTrip {
        trip: None,
        processed_keys: keys,
    }
}

fn rail_direction(direction_id: StaticDirection) -> Direction {
    match direction_id {
        StaticDirection::Zero => Direction::Outbound,
        StaticDirection::One => Direction::Inbound,
        StaticDirection::None => Direction::Unknown,
    }
}

fn subway_direction(raw: Option<&str>) -> Direction {
    match raw {
        Some("N") => Direction::North,
        Some("S") => Direction::South,
        _ => Direction::Unknown,
    }
}

/// MNR's last-resort direction rule when the static trip carries no
/// `direction_id`: a trip whose update ends at the shared terminal is
/// Inbound, one that starts there is Outbound.
fn mnr_sequence_inferred_direction(update: &RawTripUpdate) -> Direction {
    let mut ordered: Vec<&RawStopTimeUpdate> = update.stop_time_updates.iter().collect();
    ordered.sort_by_key(|stop| stop.stop_sequence.unwrap_or(0));
    let first = ordered.first();
    let last = ordered.last();
    if last.and_then(|s| s.stop_id.as_deref()) == Some(MNR_TERMINAL_STOP_ID) {
        Direction::Inbound
    } else if first.and_then(|s| s.stop_id.as_deref()) == Some(MNR_TERMINAL_STOP_ID) {
        Direction::Outbound
    } else {
        Direction::Unknown
    }
}

fn trip_direction(system: System, update: &RawTripUpdate, trip: Option<&Trip>) -> Direction {
    match system {
        System::Subway => subway_direction(update.nyct_direction.as_deref()),
        System::Lirr => trip
            .map(|t| rail_direction(t.direction_id))
            .unwrap_or(Direction::Unknown),
        System::Mnr => {
            let from_static = trip
                .map(|t| rail_direction(t.direction_id))
                .unwrap_or(Direction::Unknown);
            if from_static != Direction::Unknown {
                from_static
            } else {
                mnr_sequence_inferred_direction(update)
            }
        }
    }
}

/// Direction for a trip with no realtime update to consult, used by the
/// scheduled pass. SUBWAY's N/S vocabulary has no static counterpart.
fn scheduled_direction(system: System, direction_id: StaticDirection) -> Direction {
    match system {
        System::Subway => Direction::Unknown,
        System::Lirr | System::Mnr => rail_direction(direction_id),
    }
}

fn last_stop_in_update(update: &RawTripUpdate) -> Option<&str> {
    update
        .stop_time_updates
        .iter()
        .max_by_key(|stop| stop.stop_sequence.unwrap_or(0))
        .and_then(|stop| stop.stop_id.as_deref())
}

fn stop_name_and_region(
    index: &StaticIndex,
    system: System,
    original_stop_id: &str,
) -> (Option<String>, Option<String>) {
    match index.stops.get(&namespaced_id(system, original_stop_id)) {
        Some(stop) => (stop.name.clone(), stop.region.clone()),
        None => (None, None),
    }
}

/// Resolves a trip-wide destination by the prioritized fallback cascade:
/// MNR tries its headsign first, every other system tries the last stop
/// named in the realtime update first. Both end at the static destination
/// stop, then the headsign (if not already tried), then the route's long
/// name. `force_headsign_first` lets the scheduled pass (which has no
/// realtime "last stop in update" to offer) request the MNR ordering
/// uniformly, per §4.4's "same cascade... starting with headsign" rule.
fn resolve_destination(
    index: &StaticIndex,
    system: System,
    trip: Option<&Trip>,
    route: Option<&Route>,
    last_stop_original_id: Option<&str>,
    force_headsign_first: bool,
) -> (Option<String>, Option<String>) {
    let headsign = trip
        .and_then(|t| t.headsign.clone())
        .map(|name| (name, None));
    let static_dest = trip
        .and_then(|t| t.destination_stop_id.as_deref())
        .map(|stop_id| stop_name_and_region(index, system, stop_id))
        .and_then(|(name, region)| name.map(|name| (name, region)));
    let last_stop = last_stop_original_id
        .map(|stop_id| stop_name_and_region(index, system, stop_id))
        .and_then(|(name, region)| name.map(|name| (name, region)));
    let route_long = route.and_then(|r| r.long_name.clone()).map(|name| (name, None));

    let order: [Option<(String, Option<String>)>; 4] = if force_headsign_first || system == System::Mnr
    {
        [headsign, static_dest, last_stop, route_long]
    } else {
        [last_stop, static_dest, headsign, route_long]
    };

    for candidate in order {
        if let Some((name, region)) = candidate {
            return (Some(name), region);
        }
    }
    (None, None)
}

fn round_delay_minutes(delay_secs: i32) -> i64 {
    (delay_secs as f64 / 60.0).round() as i64
}

fn realtime_status(delay_minutes: Option<i64>, relevant_time: DateTime<Tz>, now: DateTime<Tz>) -> String {
    match delay_minutes {
        Some(minutes) if minutes > 1 => format!("Delayed {minutes} min"),
        Some(minutes) if minutes < -1 => format!("Early {} min", -minutes),
        Some(_) => "On Time".to_owned(),
        None => {
            let delta = (relevant_time - now).num_seconds();
            if (30..120).contains(&delta) {
                "Approaching".to_owned()
            } else if delta.abs() <= 30 {
                "Due".to_owned()
            } else {
                "Scheduled".to_owned()
            }
        }
    }
}

async fn fetch_trip_updates(
    feed_cache: &FeedCache,
    config: &Config,
    system: System,
    feed_paths: &HashSet<String>,
) -> Vec<RawTripUpdate> {
    let mut updates = Vec::new();
    for path in feed_paths {
        let url = format!("{}/{}", config.feed_base_url.trim_end_matches('/'), path);
        let bytes = match feed_cache
            .get(system.as_str(), &url, cache_ttl(config, system))
            .await
        {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(url, error = %err, "could not fetch realtime feed");
                continue;
            }
        };
        match realtime_feed::decode_trip_updates(&bytes) {
            Ok(mut decoded) => updates.append(&mut decoded),
            Err(err) => {
                tracing::warn!(url, error = %err, "could not decode realtime feed");
            }
        }
    }
    updates
}

/// Identifying context for a single departures() request, carried through
/// both passes so neither has to re-derive it.
struct StationContext {
    system: System,
    platform_ids: HashSet<String>,
    feed_paths: HashSet<String>,
}

fn realtime_pass(
    index: &StaticIndex,
    config: &Config,
    context: &StationContext,
    updates: Vec<RawTripUpdate>,
    now: DateTime<Tz>,
    limit_minutes: Option<i64>,
    processed: &mut HashSet<String>,
) -> Vec<(Departure, i64)> {
    let system = context.system;
    let trips_for_system = index.trips.get(&system);
    let short_name_index = index.short_name_index.get(&system);
    let stop_times_for_system = index.stop_times.get(&system);
    let mut out = Vec::new();

    for update in &updates {
        if matches!(
            update.schedule_relationship,
            ScheduleRelationship::Canceled | ScheduleRelationship::Deleted
        ) {
            continue;
        }
        if update.stop_time_updates.is_empty() {
            continue;
        }

        let resolved = resolve_static_trip(
            system,
            update,
            trips_for_system,
            short_name_index,
            &index.vehicle_label_index,
        );
        let trip = resolved.trip;

        let direction = trip_direction(system, update, trip);

        let route_id_for_lookup = trip
            .map(|t| t.route_id.clone())
            .or_else(|| update.route_id.clone());
        let route = route_id_for_lookup
            .as_deref()
            .and_then(|route_id| index.routes.get(&namespaced_id(system, route_id)));

        let last_stop_id = last_stop_in_update(update);
        let (destination, destination_region) = resolve_destination(
            index,
            system,
            trip,
            route,
            last_stop_id,
            system == System::Mnr,
        );

        let max_sequence = update
            .stop_time_updates
            .iter()
            .filter_map(|stop| stop.stop_sequence)
            .max();

        let is_peak = update
            .mta_railroad_is_peak
            .or_else(|| trip.map(|t| t.is_peak()))
            .unwrap_or(false);

        for stop_update in &update.stop_time_updates {
            let Some(stop_id) = stop_update.stop_id.as_deref() else {
                continue;
            };
            if !context.platform_ids.contains(stop_id) {
                continue;
            }
            if matches!(
                stop_update.schedule_relationship,
                ScheduleRelationship::Skipped
            ) {
                continue;
            }

            let is_max_sequence =
                stop_update.stop_sequence.is_some() && stop_update.stop_sequence == max_sequence;

            let (relevant_unix, delay_secs, is_terminal_arrival) = match system {
                System::Subway => match stop_update.departure_time_unix {
                    Some(time) if time > 0 => (time, stop_update.departure_delay_secs, false),
                    _ => continue,
                },
                System::Lirr | System::Mnr => match stop_update.departure_time_unix {
                    Some(time) if time > 0 => (time, stop_update.departure_delay_secs, false),
                    _ => match stop_update.arrival_time_unix {
                        Some(time) if time > 0 => {
                            let terminal = is_max_sequence || stop_id == MNR_TERMINAL_STOP_ID;
                            (time, stop_update.arrival_delay_secs, terminal)
                        }
                        _ => continue,
                    },
                },
            };

            let Some(relevant_time) = config.timezone.timestamp_opt(relevant_unix, 0).single() else {
                continue;
            };
            if relevant_time < now - Duration::seconds(60) {
                continue;
            }
            if let Some(limit) = limit_minutes {
                if relevant_time > now + Duration::minutes(limit) {
                    continue;
                }
            }

            let static_track = trip.and_then(|t| {
                stop_times_for_system
                    .and_then(|by_stop| by_stop.get(stop_id))
                    .and_then(|by_trip| by_trip.get(&t.id))
                    .and_then(|entry| entry.track.clone())
            });
            let track = stop_update.track.clone().or(static_track);

            let delay_minutes = delay_secs.map(round_delay_minutes);
            let status = realtime_status(delay_minutes, relevant_time, now);

            out.push((
                Departure {
                    trip_id: trip
                        .map(|t| t.id.clone())
                        .or_else(|| update.trip_id.clone())
                        .unwrap_or_default(),
                    route_id: route
                        .map(|r| r.original_id.clone())
                        .or_else(|| update.route_id.clone())
                        .unwrap_or_default(),
                    system,
                    direction,
                    destination: destination.clone(),
                    destination_region: destination_region.clone(),
                    time: Some(relevant_time.to_rfc3339()),
                    status,
                    delay_minutes,
                    track,
                    source: DepartureSource::Realtime,
                    is_terminal_arrival,
                    is_peak,
                    wheelchair_accessible: trip.map(|t| t.wheelchair_accessible).unwrap_or(false),
                    bikes_allowed: trip.map(|t| t.bikes_allowed).unwrap_or(false),
                },
                relevant_unix,
            ));
        }

        processed.extend(resolved.processed_keys);
    }

    out
}

fn scheduled_pass(
    index: &StaticIndex,
    calendar_resolver: &CalendarResolver,
    config: &Config,
    context: &StationContext,
    now: DateTime<Tz>,
    limit_minutes: Option<i64>,
    processed: &HashSet<String>,
) -> Vec<(Departure, i64)> {
    let system = context.system;
    let Some(stop_times_for_system) = index.stop_times.get(&system) else {
        return Vec::new();
    };
    let Some(trips_for_system) = index.trips.get(&system) else {
        return Vec::new();
    };
    let empty_calendars = HashMap::new();
    let calendars_for_system = index.calendars.get(&system).unwrap_or(&empty_calendars);

    let today = now.date_naive();
    let yesterday = today - Duration::days(1);

    let mut out = Vec::new();
    for service_date in [yesterday, today] {
        let active_service_ids =
            calendar_resolver.active_service_ids(calendars_for_system, system, service_date);

        for stop_id in &context.platform_ids {
            let Some(entries) = stop_times_for_system.get(stop_id) else {
                continue;
            };
            for (trip_id, entry) in entries {
                if processed.contains(trip_id) {
                    continue;
                }
                let Some(trip) = trips_for_system.get(trip_id) else {
                    continue;
                };
                if trip.system != system {
                    continue;
                }
                if let Some(short_name) = &trip.short_name {
                    if processed.contains(short_name) {
                        continue;
                    }
                }
                if !active_service_ids.contains(&trip.service_id) {
                    continue;
                }

                let Some(time_str) = entry.departure.as_deref().or(entry.arrival.as_deref()) else {
                    continue;
                };
                let Some(scheduled_time) = absolute_time(service_date, time_str, config.timezone)
                else {
                    continue;
                };

                if scheduled_time < now - Duration::seconds(60) {
                    continue;
                }
                if let Some(limit) = limit_minutes {
                    if scheduled_time > now + Duration::minutes(limit) {
                        continue;
                    }
                }

                let route = index.routes.get(&namespaced_id(system, &trip.route_id));
                let (destination, destination_region) =
                    resolve_destination(index, system, Some(trip), route, None, true);

                let visible_trip_id = if system == System::Mnr {
                    trip.short_name.clone().unwrap_or_else(|| trip.id.clone())
                } else {
                    trip.id.clone()
                };

                out.push((
                    Departure {
                        trip_id: visible_trip_id,
                        route_id: route
                            .map(|r| r.original_id.clone())
                            .unwrap_or_else(|| trip.route_id.clone()),
                        system,
                        direction: scheduled_direction(system, trip.direction_id),
                        destination,
                        destination_region,
                        time: Some(scheduled_time.to_rfc3339()),
                        status: "Scheduled".to_owned(),
                        delay_minutes: None,
                        track: entry.track.clone(),
                        source: DepartureSource::Scheduled,
                        is_terminal_arrival: false,
                        is_peak: trip.is_peak(),
                        wheelchair_accessible: trip.wheelchair_accessible,
                        bikes_allowed: trip.bikes_allowed,
                    },
                    scheduled_time.timestamp(),
                ));
            }
        }
    }
    out
}

/// Computes the departure board for the station `station_id` (a
/// namespaced stop id, which may be a station with platform children or a
/// standalone platform), as of `now`.
pub async fn departures(
    index: &StaticIndex,
    feed_cache: &FeedCache,
    calendar_resolver: &CalendarResolver,
    config: &Config,
    station_id: &str,
    limit_minutes: Option<i64>,
    source_filter: SourceFilter,
    now: DateTime<Tz>,
) -> Result<Vec<Departure>, DepartureError> {
    let Some(station) = index.stops.get(station_id) else {
        return Ok(Vec::new());
    };
    let system = station.system;

    let platform_ids: HashSet<String> = if station.child_stop_ids.is_empty() {
        [station.original_id.clone()].into_iter().collect()
    } else {
        station.child_stop_ids.iter().cloned().collect()
    };
    let feed_paths: HashSet<String> = station.feed_urls.iter().cloned().collect();

    let context = StationContext {
        system,
        platform_ids,
        feed_paths,
    };

    let mut processed: HashSet<String> = HashSet::new();
    let mut keyed = Vec::new();

    if source_filter != SourceFilter::Scheduled {
        let raw_updates = fetch_trip_updates(feed_cache, config, system, &context.feed_paths).await;
        let mut realtime_departures = realtime_pass(
            index,
            config,
            &context,
            raw_updates,
            now,
            limit_minutes,
            &mut processed,
        );
        let should_run_scheduled = match system {
            System::Lirr | System::Mnr => source_filter != SourceFilter::Realtime,
            System::Subway => {
                source_filter != SourceFilter::Realtime && realtime_departures.is_empty()
            }
        };
        keyed.append(&mut realtime_departures);

        if should_run_scheduled {
            let mut scheduled = scheduled_pass(
                index,
                calendar_resolver,
                config,
                &context,
                now,
                limit_minutes,
                &processed,
            );
            keyed.append(&mut scheduled);
        }
    } else {
        let mut scheduled = scheduled_pass(
            index,
            calendar_resolver,
            config,
            &context,
            now,
            limit_minutes,
            &processed,
        );
        keyed.append(&mut scheduled);
    }

    keyed.sort_by(|(a, a_time), (b, b_time)| {
        a.direction
            .rank()
            .cmp(&b.direction.rank())
            .then_with(|| a_time.cmp(b_time))
    });

    Ok(keyed.into_iter().map(|(departure, _)| departure).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_zeros_but_never_empties() {
        assert_eq!(strip_leading_zeros("0042"), "42");
        assert_eq!(strip_leading_zeros("0000"), "0000");
        assert_eq!(strip_leading_zeros("42"), "42");
    }

    #[test]
    fn subway_direction_maps_n_and_s_only() {
        assert_eq!(subway_direction(Some("N")), Direction::North);
        assert_eq!(subway_direction(Some("S")), Direction::South);
        assert_eq!(subway_direction(Some("E")), Direction::Unknown);
        assert_eq!(subway_direction(None), Direction::Unknown);
    }

    #[test]
    fn rail_direction_follows_zero_one_convention() {
        assert_eq!(rail_direction(StaticDirection::Zero), Direction::Outbound);
        assert_eq!(rail_direction(StaticDirection::One), Direction::Inbound);
        assert_eq!(rail_direction(StaticDirection::None), Direction::Unknown);
    }
}
