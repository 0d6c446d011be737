//! Builds a [`StaticIndex`] from the on-disk static corpus.
//!
//! The load proceeds in the fixed passes described by the loader's
//! component design: parse every system's tables, then assemble routes,
//! trip destinations, trips, stops, parent/child links, the stop-time
//! lookup, served-by/feed-url linkage and finally the auxiliary lookup
//! indexes, each pass fully consuming the previous one's output. Mirrors
//! the coarse shape of `database::rebuild` (parse everything, then link),
//! adapted to run entirely in memory rather than against sqlite.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use geo_region::{BoroughLookup, RegionLookup};
use model::calendar::{CalendarDate, CalendarWindow, Service, ServiceAvailability, ServiceExceptionType};
use model::transit::{namespaced_id, LocationType, Route, StaticDirection, Stop, StopTimeEntry, System, Trip};

use crate::error::StaticLoadError;
use crate::feed_urls;
use crate::static_data::{self, CalendarDateRow, CalendarRow, RouteRow, StopRow, StopTimeRow, TripRow};

const SYSTEMS: [System; 3] = [System::Lirr, System::Mnr, System::Subway];

/// The fully assembled, query-ready static corpus for all three systems.
pub struct StaticIndex {
    pub stops: HashMap<String, Stop>,
    pub routes: HashMap<String, Route>,
    /// Keyed by raw (unnamespaced) trip id, scoped per system: realtime
    /// feeds never cross system boundaries so a lookup always already
    /// knows which system it's asking about.
    pub trips: HashMap<System, HashMap<String, Trip>>,
    /// `original stop id -> trip id -> scheduled entry`, per system.
    pub stop_times: HashMap<System, HashMap<String, HashMap<String, StopTimeEntry>>>,
    pub calendars: HashMap<System, HashMap<String, Service>>,
    pub short_name_index: HashMap<System, HashMap<String, String>>,
    /// MNR only: some exports carry a `vehicle_label` on trips in lieu of
    /// a stable short name.
    pub vehicle_label_index: HashMap<String, String>,
}

struct SystemTables {
    stops: Vec<StopRow>,
    routes: Vec<RouteRow>,
    trips: Vec<TripRow>,
    stop_times: Vec<StopTimeRow>,
    calendar: Vec<CalendarRow>,
    calendar_dates: Vec<CalendarDateRow>,
}

fn table_path(root: &Path, system: System, file: &str) -> PathBuf {
    root.join(system.as_str().to_ascii_lowercase()).join(file)
}

fn parse_system_tables(root: &Path, system: System) -> Result<SystemTables, StaticLoadError> {
    let read = |file: &'static str| {
        static_data::read_csv(table_path(root, system, file)).map_err(|source| StaticLoadError::Csv {
            system: system.as_str().to_owned(),
            table: file,
            source,
        })
    };
    Ok(SystemTables {
        stops: read("stops.txt")?,
        routes: read("routes.txt")?,
        trips: read("trips.txt")?,
        stop_times: read("stop_times.txt")?,
        calendar: read("calendar.txt")?,
        calendar_dates: read("calendar_dates.txt")?,
    })
}

/// Loads and assembles the static index for all three systems rooted at
/// `root` (one subdirectory per system: `lirr/`, `mnr/`, `subway/`).
///
/// Any table-read or row-parse failure aborts the whole load; the caller
/// is responsible for leaving the previously published index untouched.
pub fn load(root: &Path) -> Result<StaticIndex, StaticLoadError> {
    // Pass 1: parse all six tables per system, in parallel across systems.
    let parsed: Vec<Result<(System, SystemTables), StaticLoadError>> = SYSTEMS
        .par_iter()
        .map(|&system| parse_system_tables(root, system).map(|tables| (system, tables)))
        .collect();

    let mut by_system = HashMap::new();
    for result in parsed {
        let (system, tables) = result?;
        by_system.insert(system, tables);
    }

    let region_lookup = BoroughLookup::new();

    let mut routes: HashMap<String, Route> = HashMap::new();
    let mut trips: HashMap<System, HashMap<String, Trip>> = HashMap::new();
    let mut stops: HashMap<String, Stop> = HashMap::new();
    let mut stop_times: HashMap<System, HashMap<String, HashMap<String, StopTimeEntry>>> = HashMap::new();
    let mut calendars: HashMap<System, HashMap<String, Service>> = HashMap::new();
    let mut short_name_index: HashMap<System, HashMap<String, String>> = HashMap::new();
    let mut vehicle_label_index: HashMap<String, String> = HashMap::new();

    for &system in &SYSTEMS {
        let tables = by_system.get(&system).expect("parsed above");

        // Pass 2: routes.
        for row in &tables.routes {
            let id = namespaced_id(system, &row.route_id);
            routes.insert(
                id.clone(),
                Route {
                    id,
                    original_id: row.route_id.clone(),
                    system,
                    agency_id: row.agency_id.clone(),
                    short_name: row.route_short_name.clone(),
                    long_name: row.route_long_name.clone(),
                    route_type: row.route_type,
                    color: row.route_color.clone(),
                    text_color: row.route_text_color.clone(),
                },
            );
        }

        // Pass 3: scan stop_times once to find each trip's terminal stop
        // (the stop at the maximum stop_sequence).
        let mut destination_by_trip: HashMap<&str, (u32, &str)> = HashMap::new();
        for row in &tables.stop_times {
            destination_by_trip
                .entry(row.trip_id.as_str())
                .and_modify(|(seq, stop)| {
                    // Last wins on a tie: a later row at the same max
                    // sequence replaces the earlier winner.
                    if row.stop_sequence >= *seq {
                        *seq = row.stop_sequence;
                        *stop = row.stop_id.as_str();
                    }
                })
                .or_insert((row.stop_sequence, row.stop_id.as_str()));
        }

        // Pass 4: trips.
        let mut system_trips = HashMap::new();
        for row in &tables.trips {
            let direction_id = match row.direction_id.as_deref() {
                Some("0") => StaticDirection::Zero,
                Some("1") => StaticDirection::One,
                _ => StaticDirection::None,
            };
            let destination_stop_id = destination_by_trip
                .get(row.trip_id.as_str())
                .map(|(_, stop)| (*stop).to_owned());
            system_trips.insert(
                row.trip_id.clone(),
                Trip {
                    id: row.trip_id.clone(),
                    system,
                    route_id: row.route_id.clone(),
                    service_id: row.service_id.clone(),
                    headsign: row.trip_headsign.clone(),
                    short_name: row.trip_short_name.clone(),
                    direction_id,
                    peak_offpeak: row.peak_offpeak.clone(),
                    block_id: row.block_id.clone(),
                    shape_id: row.shape_id.clone(),
                    wheelchair_accessible: row.wheelchair_accessible.as_deref() == Some("1"),
                    bikes_allowed: row.bikes_allowed.as_deref() == Some("1"),
                    destination_stop_id,
                },
            );
        }
        // Pass 5: stops, with region classification.
        let mut system_stops = HashMap::new();
        for row in &tables.stops {
            let id = namespaced_id(system, &row.stop_id);
            let latitude = row.stop_lat.as_deref().and_then(|v| v.parse::<f64>().ok());
            let longitude = row.stop_lon.as_deref().and_then(|v| v.parse::<f64>().ok());
            let region = match (latitude, longitude) {
                (Some(lat), Some(lon)) => region_lookup.region_for(lat, lon),
                _ => None,
            };
            let location_type = match row.location_type.as_deref() {
                Some("1") => LocationType::Station,
                Some("2") => LocationType::EntranceExit,
                Some("3") => LocationType::GenericNode,
                Some("4") => LocationType::BoardingArea,
                _ => LocationType::StopOrPlatform,
            };
            system_stops.insert(
                row.stop_id.clone(),
                Stop {
                    id,
                    original_id: row.stop_id.clone(),
                    system,
                    name: row.stop_name.clone(),
                    latitude,
                    longitude,
                    parent_id: row
                        .parent_station
                        .as_deref()
                        .map(|parent| namespaced_id(system, parent)),
                    location_type,
                    wheelchair_boarding: row.wheelchair_boarding.as_deref() == Some("1"),
                    child_stop_ids: HashSet::new(),
                    served_by_route_ids: HashSet::new(),
                    feed_urls: HashSet::new(),
                    region,
                },
            );
        }

        // Pass 6: link children to parents (by original, unnamespaced id).
        let child_ids: Vec<(String, String)> = tables
            .stops
            .iter()
            .filter_map(|row| {
                row.parent_station
                    .as_ref()
                    .map(|parent| (parent.clone(), row.stop_id.clone()))
            })
            .collect();
        for (parent_original_id, child_original_id) in child_ids {
            if let Some(parent) = system_stops.get_mut(&parent_original_id) {
                parent.child_stop_ids.insert(child_original_id);
            }
        }

        // Pass 7: stop-time lookup, keyed by original stop id then trip id.
        let mut system_stop_times: HashMap<String, HashMap<String, StopTimeEntry>> = HashMap::new();
        for row in &tables.stop_times {
            system_stop_times
                .entry(row.stop_id.clone())
                .or_default()
                .insert(
                    row.trip_id.clone(),
                    StopTimeEntry {
                        arrival: row.arrival_time.clone(),
                        departure: row.departure_time.clone(),
                        stop_sequence: row.stop_sequence,
                        track: row.track.clone(),
                    },
                );
        }

        // Pass 8: served-by-route / feed-url linkage, propagated up to the
        // parent station where one exists.
        for row in &tables.stop_times {
            let Some(trip) = system_trips.get(&row.trip_id) else {
                continue;
            };
            let Some(route) = routes.get(&namespaced_id(system, &trip.route_id)) else {
                continue;
            };
            let feed_path = feed_urls::feed_path_for_route(system, &route.original_id);

            let parent_original_id = system_stops
                .get(&row.stop_id)
                .and_then(|stop| stop.parent_id.as_ref())
                .and_then(|id| model::transit::split_namespaced_id(id))
                .map(|(_, original)| original.to_owned());

            if let Some(stop) = system_stops.get_mut(&row.stop_id) {
                stop.served_by_route_ids.insert(route.original_id.clone());
                if let Some(path) = feed_path {
                    stop.feed_urls.insert(path.to_owned());
                }
            }
            if let Some(parent_original_id) = parent_original_id {
                if let Some(parent) = system_stops.get_mut(&parent_original_id) {
                    parent.served_by_route_ids.insert(route.original_id.clone());
                    if let Some(path) = feed_path {
                        parent.feed_urls.insert(path.to_owned());
                    }
                }
            }
        }

        for (original_id, stop) in system_stops {
            stops.insert(namespaced_id(system, &original_id), stop);
        }
        stop_times.insert(system, system_stop_times);
        trips.insert(system, system_trips);

        // Pass 9: auxiliary indexes.
        let mut name_index = HashMap::new();
        for trip in trips.get(&system).into_iter().flatten() {
            if let Some(short_name) = &trip.1.short_name {
                name_index.insert(short_name.clone(), trip.1.id.clone());
            }
        }
        short_name_index.insert(system, name_index);

        if system == System::Mnr {
            for row in &tables.trips {
                if let Some(label) = &row.vehicle_label {
                    vehicle_label_index.insert(label.clone(), row.trip_id.clone());
                }
            }
        }

        // Calendars: group windows and date exceptions by service id.
        let mut system_calendars: HashMap<String, Service> = HashMap::new();
        for row in &tables.calendar {
            let window = CalendarWindow {
                monday: ServiceAvailability::from_bool(row.monday == 1),
                tuesday: ServiceAvailability::from_bool(row.tuesday == 1),
                wednesday: ServiceAvailability::from_bool(row.wednesday == 1),
                thursday: ServiceAvailability::from_bool(row.thursday == 1),
                friday: ServiceAvailability::from_bool(row.friday == 1),
                saturday: ServiceAvailability::from_bool(row.saturday == 1),
                sunday: ServiceAvailability::from_bool(row.sunday == 1),
                start_date: row.start_date,
                end_date: row.end_date,
            };
            system_calendars
                .entry(row.service_id.clone())
                .or_insert_with(|| Service {
                    windows: Vec::new(),
                    dates: Vec::new(),
                })
                .windows
                .push(window);
        }
        for row in &tables.calendar_dates {
            let exception_type = if row.exception_type == 1 {
                ServiceExceptionType::Added
            } else {
                ServiceExceptionType::Removed
            };
            system_calendars
                .entry(row.service_id.clone())
                .or_insert_with(|| Service {
                    windows: Vec::new(),
                    dates: Vec::new(),
                })
                .dates
                .push(CalendarDate {
                    date: row.date,
                    exception_type,
                });
        }
        calendars.insert(system, system_calendars);
    }

    Ok(StaticIndex {
        stops,
        routes,
        trips,
        stop_times,
        calendars,
        short_name_index,
        vehicle_label_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes a minimal single-system corpus (one parent station, one
    /// child platform, one route, one trip with two stop-times) under a
    /// fresh temp directory and returns its root.
    fn write_corpus(root: &Path) {
        for system_dir in ["lirr", "mnr", "subway"] {
            let dir = root.join(system_dir);
            std::fs::create_dir_all(&dir).unwrap();

            std::fs::write(
                dir.join("stops.txt"),
                "stop_id,stop_name,stop_lat,stop_lon,parent_station,location_type,wheelchair_boarding\n\
                 STATION,Test Station,40.7527,-73.9772,,1,1\n\
                 PLATFORM1, Test Station Platform ,40.7527,-73.9772,STATION,0,1\n",
            )
            .unwrap();
            std::fs::write(
                dir.join("routes.txt"),
                "route_id,agency_id,route_short_name,route_long_name,route_type,route_color,route_text_color\n\
                 R1,AGENCY,R,Test Route,2,,\n",
            )
            .unwrap();
            std::fs::write(
                dir.join("trips.txt"),
                "trip_id,route_id,service_id,trip_headsign,trip_short_name,direction_id,block_id,shape_id,wheelchair_accessible,bikes_allowed,peak_offpeak\n\
                 TRIP1,R1,WEEKDAY,Downtown,101,0,,,1,1,1\n",
            )
            .unwrap();
            std::fs::write(
                dir.join("stop_times.txt"),
                "trip_id,stop_id,arrival_time,departure_time,stop_sequence,track\n\
                 TRIP1,PLATFORM1,08:00:00,08:00:00,1,\n\
                 TRIP1,PLATFORM1,08:10:00,08:10:00,2,4\n",
            )
            .unwrap();
            std::fs::write(
                dir.join("calendar.txt"),
                "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
                 WEEKDAY,1,1,1,1,1,0,0,20260101,20261231\n",
            )
            .unwrap();
            std::fs::write(dir.join("calendar_dates.txt"), "service_id,date,exception_type\n").unwrap();
        }
    }

    fn unique_temp_dir(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("gtfs-index-test-{name}-{:?}", std::thread::current().id()));
        dir
    }

    #[test]
    fn links_children_to_parents_and_computes_destinations() {
        let root = unique_temp_dir("links");
        write_corpus(&root);
        let index = load(&root).expect("minimal corpus should load");

        let station_id = namespaced_id(System::Lirr, "STATION");
        let station = index.stops.get(&station_id).expect("station present");
        assert!(station.child_stop_ids.contains("PLATFORM1"));

        let route_id = namespaced_id(System::Lirr, "R1");
        assert!(station.served_by_route_ids.contains("R1"));
        assert!(index.routes.contains_key(&route_id));

        let feed_path = feed_urls::feed_path_for_route(System::Lirr, "R1").unwrap();
        assert!(station.feed_urls.contains(feed_path));

        let trip = index.trips[&System::Lirr].get("TRIP1").expect("trip present");
        assert_eq!(trip.destination_stop_id.as_deref(), Some("PLATFORM1"));
        assert!(trip.is_peak());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn builds_the_short_name_and_stop_time_indexes() {
        let root = unique_temp_dir("shortname");
        write_corpus(&root);
        let index = load(&root).expect("minimal corpus should load");

        assert_eq!(
            index.short_name_index[&System::Mnr].get("101").map(String::as_str),
            Some("TRIP1")
        );

        let entry = index.stop_times[&System::Subway]["PLATFORM1"]
            .get("TRIP1")
            .expect("stop-time entry present");
        assert_eq!(entry.stop_sequence, 2);
        assert_eq!(entry.track.as_deref(), Some("4"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn rebuilding_from_the_same_corpus_snapshot_is_deep_equal() {
        let root = unique_temp_dir("idempotent");
        write_corpus(&root);
        let first = load(&root).expect("first load");
        let second = load(&root).expect("second load");

        assert_eq!(first.stops.keys().collect::<HashSet<_>>(), second.stops.keys().collect::<HashSet<_>>());
        for (id, stop) in &first.stops {
            let other = &second.stops[id];
            assert_eq!(stop.child_stop_ids, other.child_stop_ids);
            assert_eq!(stop.served_by_route_ids, other.served_by_route_ids);
            assert_eq!(stop.feed_urls, other.feed_urls);
        }

        std::fs::remove_dir_all(&root).ok();
    }
}
