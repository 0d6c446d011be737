//! `GET /departures/{stationId}` — the departure board for one station.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use model::transit::{Departure, SourceFilter};

use crate::error::ApiError;
use crate::WebState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawDeparturesQuery {
    limit_minutes: Option<String>,
    source: Option<String>,
}

fn parse_limit_minutes(raw: Option<String>) -> Result<Option<i64>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: i64 = raw.parse().map_err(|_| {
        ApiError::BadRequest(format!("limitMinutes must be an integer, got {raw:?}"))
    })?;
    if value <= 0 {
        return Err(ApiError::BadRequest(
            "limitMinutes must be a positive integer".to_owned(),
        ));
    }
    Ok(Some(value))
}

fn parse_source_filter(raw: Option<String>) -> Result<SourceFilter, ApiError> {
    match raw.as_deref() {
        None => Ok(SourceFilter::Both),
        Some("realtime") => Ok(SourceFilter::Realtime),
        Some("scheduled") => Ok(SourceFilter::Scheduled),
        Some(other) => Err(ApiError::BadRequest(format!(
            "source must be one of realtime, scheduled, got {other:?}"
        ))),
    }
}

pub async fn list_departures(
    State(state): State<WebState>,
    Path(station_id): Path<String>,
    Query(params): Query<RawDeparturesQuery>,
) -> Result<Json<Vec<Departure>>, ApiError> {
    let limit_minutes = parse_limit_minutes(params.limit_minutes)?;
    let source_filter = parse_source_filter(params.source)?;

    let index = state.current_index();
    let now = Utc::now().with_timezone(&state.config.timezone);

    let departures = engine::departures::departures(
        &index,
        &state.feed_cache,
        &state.calendar_resolver,
        &state.config,
        &station_id,
        limit_minutes,
        source_filter,
        now,
    )
    .await
    .map_err(|err| match err {})?;

    Ok(Json(departures))
}
