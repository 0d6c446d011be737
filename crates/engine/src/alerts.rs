//! Fetches, resolves and filters service alerts.
//!
//! Resolves each alert's `informed_entity` references against the static
//! index (route/stop lookups), reusing the same feed cache and
//! static-index lookup patterns as the departure engine.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use gtfs::feed_urls::{self, ALERTS_FEED_PATH};
use gtfs::index::StaticIndex;
use gtfs::realtime_feed::{self, RawAlert};
use model::transit::{namespaced_id, ActivePeriod, Alert, System};

use crate::config::Config;
use crate::error::AlertError;
use crate::feed_cache::FeedCache;

const ALL_SYSTEMS: [System; 3] = [System::Lirr, System::Mnr, System::Subway];

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub target_lines: Option<HashSet<String>>,
    pub active_now: bool,
    pub station_id: Option<String>,
    pub include_labels: bool,
}

fn to_millis(seconds: Option<i64>) -> Option<i64> {
    seconds.map(|value| value * 1000)
}

/// The [start, end] pair this alert should be sorted and filtered on:
/// an active-now period if any exists, else the nearest future one, else
/// the first period in the list.
fn primary_period(periods: &[ActivePeriod], now_ms: i64) -> Option<ActivePeriod> {
    if let Some(active) = periods.iter().find(|period| {
        period.start.map(|s| s <= now_ms).unwrap_or(true)
            && period.end.map(|e| e >= now_ms).unwrap_or(true)
    }) {
        return Some(active.clone());
    }
    let mut future: Vec<&ActivePeriod> = periods
        .iter()
        .filter(|period| period.start.map(|s| s > now_ms).unwrap_or(false))
        .collect();
    future.sort_by_key(|period| period.start.unwrap_or(i64::MAX));
    if let Some(nearest) = future.into_iter().next() {
        return Some(nearest.clone());
    }
    periods.first().cloned()
}

fn resolve_route(
    index: &StaticIndex,
    agency_id: &str,
    route_id: &str,
) -> Option<String> {
    let system = feed_urls::system_for_agency_id(agency_id)?;
    let namespaced = namespaced_id(system, route_id);
    index.routes.contains_key(&namespaced).then_some(namespaced)
}

/// Resolves a raw (unnamespaced) stop id by trying every known system
/// prefix; a hit on a child stop also yields its parent station.
fn resolve_stops(index: &StaticIndex, raw_stop_id: &str) -> Vec<String> {
    let mut hits = Vec::new();
    for system in ALL_SYSTEMS {
        let namespaced = namespaced_id(system, raw_stop_id);
        if let Some(stop) = index.stops.get(&namespaced) {
            hits.push(namespaced.clone());
            if let Some(parent_id) = &stop.parent_id {
                hits.push(parent_id.clone());
            }
        }
    }
    hits
}

struct ResolvedAlert {
    alert: Alert,
    periods: Vec<ActivePeriod>,
    primary_start: i64,
}

fn resolve_alert(index: &StaticIndex, raw: RawAlert, now_ms: i64) -> ResolvedAlert {
    let mut affected_lines = HashSet::new();
    let mut affected_stations = HashSet::new();

    for entity in &raw.informed_entities {
        if let Some(agency_id) = &entity.agency_id {
            if feed_urls::is_bus_agency(agency_id) {
                continue;
            }
            if let Some(route_id) = &entity.route_id {
                if let Some(namespaced_route) = resolve_route(index, agency_id, route_id) {
                    affected_lines.insert(namespaced_route);
                }
            }
        }
        if let Some(stop_id) = &entity.stop_id {
            for hit in resolve_stops(index, stop_id) {
                affected_stations.insert(hit);
            }
        }
    }

    let periods: Vec<ActivePeriod> = raw
        .active_periods
        .iter()
        .map(|period| ActivePeriod {
            start: to_millis(period.start),
            end: to_millis(period.end),
        })
        .collect();
    let primary = primary_period(&periods, now_ms);
    let primary_start = primary.and_then(|period| period.start).unwrap_or(0);

    let description_html = raw
        .description
        .or_else(|| raw.header.clone())
        .unwrap_or_default();

    ResolvedAlert {
        alert: Alert {
            id: raw.id,
            header: raw.header.unwrap_or_default(),
            description: description_html,
            affected_lines,
            affected_stations,
            active_periods: periods.clone(),
            labels: Vec::new(),
        },
        periods,
        primary_start,
    }
}

fn matches_active_now(periods: &[ActivePeriod], now_ms: i64) -> bool {
    periods.iter().any(|period| {
        period.start.map(|s| s <= now_ms).unwrap_or(true)
            && period.end.map(|e| e >= now_ms).unwrap_or(true)
    })
}

fn matches_target_lines(alert: &Alert, target_lines: &HashSet<String>) -> bool {
    alert.affected_lines.iter().any(|line| {
        target_lines
            .iter()
            .any(|target| target.eq_ignore_ascii_case(line))
    })
}

fn matches_station(index: &StaticIndex, alert: &Alert, station_id: &str) -> bool {
    if alert.affected_stations.contains(station_id) {
        return true;
    }
    let Some(station) = index.stops.get(station_id) else {
        return false;
    };
    station.served_by_route_ids.iter().any(|route_id| {
        alert
            .affected_lines
            .contains(&namespaced_id(station.system, route_id))
    })
}

/// Decodes common HTML entities; deliberately small, the alert feed only
/// ever emits a handful of these.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newline_run = 0;
    for ch in text.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(ch);
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }
    out
}

/// Converts the retained alert HTML to Markdown-like plain text: fenced
/// code blocks for `<pre>`, atx headings for `<h1>`-`<h6>`, hyphen bullets
/// for `<li>`, escaped brackets unescaped so route tokens like `[A]`
/// survive, runs of 3+ newlines collapsed, common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut text = html.to_owned();
    text = text.replace("<br/>", "\n").replace("<br />", "\n").replace("<br>", "\n");
    text = text.replace("</p>", "\n\n").replace("<p>", "");
    text = text.replace("<pre>", "\n```\n").replace("</pre>", "\n```\n");
    text = text.replace("<ul>", "\n").replace("</ul>", "\n");
    text = text.replace("<ol>", "\n").replace("</ol>", "\n");
    text = text.replace("<li>", "- ").replace("</li>", "\n");
    for level in 1..=6 {
        let open = format!("<h{level}>");
        let close = format!("</h{level}>");
        text = text.replace(&open, &format!("\n{} ", "#".repeat(level)));
        text = text.replace(&close, "\n");
    }

    // Strip any remaining tags.
    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    let unescaped = stripped.replace("\\[", "[").replace("\\]", "]");
    let decoded = decode_entities(&unescaped);
    collapse_blank_lines(decoded.trim())
}

fn subway_label(route: &model::transit::Route) -> String {
    let short_name = route.short_name.clone().unwrap_or_default();
    let is_express = route
        .long_name
        .as_deref()
        .map(|name| name.to_ascii_lowercase().contains("express"))
        .unwrap_or(false);
    if is_express {
        format!("{short_name} Express")
    } else {
        format!("{short_name} Train")
    }
}

fn build_labels(index: &StaticIndex, alert: &Alert) -> Vec<String> {
    let mut labels = Vec::new();
    for line in &alert.affected_lines {
        let Some(route) = index.routes.get(line) else {
            continue;
        };
        let label = if route.system == System::Subway {
            subway_label(route)
        } else {
            route.long_name.clone().unwrap_or_else(|| route.short_name.clone().unwrap_or_default())
        };
        labels.push(label);
    }
    for station_id in &alert.affected_stations {
        if let Some(stop) = index.stops.get(station_id) {
            if let Some(name) = &stop.name {
                labels.push(name.clone());
            }
        }
    }
    labels
}

/// Fetches the consolidated alert feed, resolves and filters it per the
/// supplied `filter`, and returns the survivors sorted by primary-period
/// start descending, HTML descriptions converted to plain text.
pub async fn alerts(
    index: &StaticIndex,
    feed_cache: &FeedCache,
    config: &Config,
    filter: &AlertFilter,
    now: DateTime<Utc>,
) -> Result<Vec<Alert>, AlertError> {
    let url = format!(
        "{}/{}",
        config.feed_base_url.trim_end_matches('/'),
        ALERTS_FEED_PATH
    );
    let bytes = feed_cache
        .get("alerts", &url, config.cache_ttl_alerts)
        .await
        .map_err(AlertError::Feed)?;
    let raw_alerts = realtime_feed::decode_alerts(&bytes).map_err(|source| {
        AlertError::Feed(crate::error::FeedError::Decode {
            url: url.clone(),
            source,
        })
    })?;

    let now_ms = now.timestamp_millis();

    let mut seen_ids = HashSet::new();
    let mut resolved = Vec::new();
    for raw in raw_alerts {
        if !seen_ids.insert(raw.id.clone()) {
            continue;
        }
        resolved.push(resolve_alert(index, raw, now_ms));
    }

    let mut survivors: Vec<ResolvedAlert> = resolved
        .into_iter()
        .filter(|entry| {
            if filter.active_now && !matches_active_now(&entry.periods, now_ms) {
                return false;
            }
            if let Some(target_lines) = &filter.target_lines {
                if !matches_target_lines(&entry.alert, target_lines) {
                    return false;
                }
            }
            if let Some(station_id) = &filter.station_id {
                if !matches_station(index, &entry.alert, station_id) {
                    return false;
                }
            }
            true
        })
        .collect();

    survivors.sort_by(|a, b| b.primary_start.cmp(&a.primary_start));

    let alerts = survivors
        .into_iter()
        .map(|mut entry| {
            entry.alert.description = html_to_text(&entry.alert.description);
            entry.alert.header = html_to_text(&entry.alert.header);
            if filter.include_labels {
                entry.alert.labels = build_labels(index, &entry.alert);
            }
            entry.alert
        })
        .collect();

    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_to_text_unescapes_brackets_and_collapses_blank_lines() {
        let html = "<p>Service on the \\[L\\] is suspended.</p>\n\n\n\nMore info: &amp; details.";
        let text = html_to_text(html);
        assert!(text.contains("[L]"));
        assert!(!text.contains("\n\n\n"));
        assert!(text.contains("&"));
    }

    #[test]
    fn html_to_text_converts_list_items_to_hyphen_bullets() {
        let html = "<ul><li>First</li><li>Second</li></ul>";
        let text = html_to_text(html);
        assert!(text.contains("- First"));
        assert!(text.contains("- Second"));
    }
}
