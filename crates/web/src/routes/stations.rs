//! `GET /stations` — substring-on-name and system filters over the
//! current Static Index.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use model::transit::{LocationType, System};

use crate::error::ApiError;
use crate::WebState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawStationsQuery {
    q: Option<String>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSummary {
    id: String,
    name: Option<String>,
    system: System,
    latitude: Option<f64>,
    longitude: Option<f64>,
    region: Option<String>,
    location_type: LocationType,
    wheelchair_boarding: bool,
}

pub async fn list_stations(
    State(state): State<WebState>,
    Query(params): Query<RawStationsQuery>,
) -> Result<Json<Vec<StationSummary>>, ApiError> {
    let system_filter = match params.system.as_deref() {
        None => None,
        Some(raw) => Some(
            System::from_str(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown system {raw:?}")))?,
        ),
    };
    let needle = params.q.map(|q| q.to_ascii_lowercase());

    let index = state.current_index();
    let mut stations: Vec<StationSummary> = index
        .stops
        .values()
        .filter(|stop| {
            // Station-level stops only: a parent station (location_type
            // Station) or a standalone stop with no parent of its own.
            // Platforms (child stops with a parent_id), entrances/exits,
            // generic nodes and boarding areas are never "stations".
            stop.parent_id.is_none() && stop.location_type != LocationType::EntranceExit
                && stop.location_type != LocationType::GenericNode
                && stop.location_type != LocationType::BoardingArea
        })
        .filter(|stop| {
            system_filter
                .map(|system| stop.system == system)
                .unwrap_or(true)
        })
        .filter(|stop| {
            needle
                .as_deref()
                .map(|needle| {
                    stop.name
                        .as_deref()
                        .map(|name| name.to_ascii_lowercase().contains(needle))
                        .unwrap_or(false)
                })
                .unwrap_or(true)
        })
        .map(|stop| StationSummary {
            id: stop.id.clone(),
            name: stop.name.clone(),
            system: stop.system,
            latitude: stop.latitude,
            longitude: stop.longitude,
            region: stop.region.clone(),
            location_type: stop.location_type,
            wheelchair_boarding: stop.wheelchair_boarding,
        })
        .collect();

    stations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(Json(stations))
}
