//! `GET /health` — liveness only, always 200 regardless of index
//! staleness; a caller wanting readiness already has §7's "static-data
//! unavailable ⇒ empty querysets" behavior on the other endpoints.

use axum::Json;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    status: &'static str,
    timestamp: String,
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}
