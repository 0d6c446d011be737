//! `GET /alerts` — consolidated service alerts, filtered by line/station/
//! active-now.

use std::collections::HashSet;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use engine::alerts::AlertFilter;
use model::transit::Alert;

use crate::error::ApiError;
use crate::WebState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawAlertsQuery {
    lines: Option<String>,
    active_now: Option<String>,
    station_id: Option<String>,
    include_labels: Option<String>,
}

fn parse_bool_flag(raw: &str) -> bool {
    matches!(raw, "true" | "1")
}

pub async fn list_alerts(
    State(state): State<WebState>,
    Query(params): Query<RawAlertsQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let target_lines = params
        .lines
        .map(|raw| {
            raw.split(',')
                .map(|line| line.trim().to_owned())
                .filter(|line| !line.is_empty())
                .collect::<HashSet<String>>()
        })
        .filter(|lines| !lines.is_empty());

    let filter = AlertFilter {
        target_lines,
        active_now: params
            .active_now
            .as_deref()
            .map(parse_bool_flag)
            .unwrap_or(false),
        station_id: params.station_id,
        include_labels: params
            .include_labels
            .as_deref()
            .map(parse_bool_flag)
            .unwrap_or(false),
    };

    let index = state.current_index();
    let alerts = engine::alerts::alerts(&index, &state.feed_cache, &state.config, &filter, Utc::now())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(Json(alerts))
}
