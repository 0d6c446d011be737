//! Row shapes for the four (plus two calendar) per-system static tables.
//!
//! Field names mirror the GTFS reference the way `data_model/{stops,
//! routes,trips,stop_times,calendar,calendar_dates}.rs` already quote it,
//! flattened to plain owned strings rather than the generic `Id<T>`
//! wrapper those modules use: the loader namespaces ids itself (see
//! [`crate::index`]), so a typed-per-table id wrapper would just be
//! discarded at the loader boundary.

use serde::Deserialize;

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_owned())
}

fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopRow {
    #[serde(rename = "stop_id", deserialize_with = "trimmed")]
    pub stop_id: String,
    #[serde(rename = "stop_name", deserialize_with = "trimmed_opt", default)]
    pub stop_name: Option<String>,
    #[serde(rename = "stop_lat", default)]
    pub stop_lat: Option<String>,
    #[serde(rename = "stop_lon", default)]
    pub stop_lon: Option<String>,
    #[serde(rename = "parent_station", deserialize_with = "trimmed_opt", default)]
    pub parent_station: Option<String>,
    #[serde(rename = "location_type", default)]
    pub location_type: Option<String>,
    #[serde(rename = "wheelchair_boarding", default)]
    pub wheelchair_boarding: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRow {
    #[serde(rename = "route_id", deserialize_with = "trimmed")]
    pub route_id: String,
    #[serde(rename = "agency_id", deserialize_with = "trimmed_opt", default)]
    pub agency_id: Option<String>,
    #[serde(rename = "route_short_name", deserialize_with = "trimmed_opt", default)]
    pub route_short_name: Option<String>,
    #[serde(rename = "route_long_name", deserialize_with = "trimmed_opt", default)]
    pub route_long_name: Option<String>,
    #[serde(rename = "route_type", default)]
    pub route_type: Option<i32>,
    #[serde(rename = "route_color", deserialize_with = "trimmed_opt", default)]
    pub route_color: Option<String>,
    #[serde(rename = "route_text_color", deserialize_with = "trimmed_opt", default)]
    pub route_text_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripRow {
    #[serde(rename = "trip_id", deserialize_with = "trimmed")]
    pub trip_id: String,
    #[serde(rename = "route_id", deserialize_with = "trimmed")]
    pub route_id: String,
    #[serde(rename = "service_id", deserialize_with = "trimmed")]
    pub service_id: String,
    #[serde(rename = "trip_headsign", deserialize_with = "trimmed_opt", default)]
    pub trip_headsign: Option<String>,
    #[serde(rename = "trip_short_name", deserialize_with = "trimmed_opt", default)]
    pub trip_short_name: Option<String>,
    #[serde(rename = "direction_id", default)]
    pub direction_id: Option<String>,
    #[serde(rename = "block_id", deserialize_with = "trimmed_opt", default)]
    pub block_id: Option<String>,
    #[serde(rename = "shape_id", deserialize_with = "trimmed_opt", default)]
    pub shape_id: Option<String>,
    #[serde(rename = "wheelchair_accessible", default)]
    pub wheelchair_accessible: Option<String>,
    #[serde(rename = "bikes_allowed", default)]
    pub bikes_allowed: Option<String>,
    /// Non-standard MTA column, present on LIRR/MNR `trips.txt` only.
    #[serde(rename = "peak_offpeak", default)]
    pub peak_offpeak: Option<String>,
    /// Non-standard MTA column, present on some MNR `trips.txt` exports.
    #[serde(rename = "vehicle_label", deserialize_with = "trimmed_opt", default)]
    pub vehicle_label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimeRow {
    #[serde(rename = "trip_id", deserialize_with = "trimmed")]
    pub trip_id: String,
    #[serde(rename = "stop_id", deserialize_with = "trimmed")]
    pub stop_id: String,
    #[serde(rename = "arrival_time", deserialize_with = "trimmed_opt", default)]
    pub arrival_time: Option<String>,
    #[serde(rename = "departure_time", deserialize_with = "trimmed_opt", default)]
    pub departure_time: Option<String>,
    #[serde(rename = "stop_sequence")]
    pub stop_sequence: u32,
    /// Non-standard MTA column carrying the scheduled track assignment.
    #[serde(rename = "track", deserialize_with = "trimmed_opt", default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarRow {
    #[serde(rename = "service_id", deserialize_with = "trimmed")]
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    #[serde(deserialize_with = "utility::serde::date_time::deserialize_yyyymmdd")]
    pub start_date: chrono::NaiveDate,
    #[serde(deserialize_with = "utility::serde::date_time::deserialize_yyyymmdd")]
    pub end_date: chrono::NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarDateRow {
    #[serde(rename = "service_id", deserialize_with = "trimmed")]
    pub service_id: String,
    #[serde(deserialize_with = "utility::serde::date_time::deserialize_yyyymmdd")]
    pub date: chrono::NaiveDate,
    pub exception_type: u8,
}

pub fn read_csv<T, P>(path: P) -> Result<Vec<T>, csv::Error>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<std::path::Path>,
{
    let mut reader = csv::Reader::from_path(path)?;
    reader.deserialize().collect()
}
