//! Resolves which service ids run on a given civil date, memoized per
//! (system, date) pair so a burst of departure requests on the same day
//! doesn't re-walk every calendar window and exception.
//!
//! The per-service availability check itself is `model::calendar::Service
//! ::check_availability`, kept as-is: it already implements the
//! weekday-window-plus-date-exception semantics this needs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use model::calendar::Service;
use model::transit::System;

pub struct CalendarResolver {
    memo: Mutex<HashMap<(System, NaiveDate), Arc<HashSet<String>>>>,
}

impl CalendarResolver {
    pub fn new() -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the set of service ids active on `date` for `system`,
    /// computing and caching it on first request.
    pub fn active_service_ids(
        &self,
        calendars: &HashMap<String, Service>,
        system: System,
        date: NaiveDate,
    ) -> Arc<HashSet<String>> {
        let mut memo = self.memo.lock().expect("calendar memo poisoned");
        if let Some(ids) = memo.get(&(system, date)) {
            return ids.clone();
        }

        let ids: HashSet<String> = calendars
            .iter()
            .filter(|(_, service)| service.check_availability(date).is_available())
            .map(|(service_id, _)| service_id.clone())
            .collect();
        let ids = Arc::new(ids);
        memo.insert((system, date), ids.clone());
        ids
    }

    /// Drops every memoized date, called whenever a fresh static index is
    /// published: the old entries reference a calendar table that no
    /// longer exists.
    pub fn clear(&self) {
        self.memo.lock().expect("calendar memo poisoned").clear();
    }
}

impl Default for CalendarResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::calendar::{CalendarWindow, ServiceAvailability};

    fn weekday_service(start: NaiveDate, end: NaiveDate) -> Service {
        let available = ServiceAvailability::Available;
        let unavailable = ServiceAvailability::Unavailable;
        Service {
            windows: vec![CalendarWindow {
                monday: available,
                tuesday: available,
                wednesday: available,
                thursday: available,
                friday: available,
                saturday: unavailable,
                sunday: unavailable,
                start_date: start,
                end_date: end,
            }],
            dates: vec![],
        }
    }

    #[test]
    fn memoizes_repeated_lookups_for_the_same_day() {
        let mut calendars = HashMap::new();
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        calendars.insert("WEEKDAY".to_owned(), weekday_service(start, end));

        let resolver = CalendarResolver::new();
        let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let first = resolver.active_service_ids(&calendars, System::Subway, monday);
        let second = resolver.active_service_ids(&calendars, System::Subway, monday);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.contains("WEEKDAY"));

        let saturday = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let weekend = resolver.active_service_ids(&calendars, System::Subway, saturday);
        assert!(!weekend.contains("WEEKDAY"));
    }
}
