//! Gates download-task leasing by configured time-of-day permission windows.
//!
//! Mirrors the original scheduling model: if no enabled [`DownloadSchedule`]
//! exists, downloads are always permitted. Otherwise downloads are allowed
//! only while the current moment falls inside at least one enabled window.

use chrono::{Local, NaiveTime};

use crate::db::{DownloadSchedule, Store};
use crate::error::Result;
use crate::types::Weekday;

/// Evaluates whether download tasks may currently be leased.
#[derive(Clone)]
pub struct ScheduleGate {
    store: Store,
}

impl ScheduleGate {
    /// Build a gate backed by the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Whether downloads are allowed right now, given the currently enabled
    /// schedules. Consulted once per dispatcher tick before leasing download
    /// tasks; never gates sync tasks. Evaluated against the server's local
    /// time, matching how operators author `days_of_week`/`start_time` windows.
    pub async fn is_download_allowed(&self) -> Result<bool> {
        let schedules = self.store.list_enabled_schedules().await?;
        let now = Local::now();
        let current_day = Weekday::from_chrono(now.weekday());
        Ok(Self::evaluate(&schedules, current_day, now.time()))
    }

    /// Pure evaluation against an explicit day/time, split out so tests don't
    /// depend on wall-clock time or the host's local timezone.
    fn evaluate(schedules: &[DownloadSchedule], current_day: Weekday, current_time: NaiveTime) -> bool {
        if schedules.is_empty() {
            return true;
        }

        schedules
            .iter()
            .any(|schedule| window_allows(schedule, current_day, current_time))
    }
}

fn window_allows(schedule: &DownloadSchedule, day: Weekday, time: NaiveTime) -> bool {
    if !schedule.days_of_week.contains(&day) {
        return false;
    }

    let (Some(start), Some(end)) = (parse_time(&schedule.start_time), parse_time(&schedule.end_time)) else {
        return false;
    };

    if start <= end {
        start <= time && time <= end
    } else {
        // overnight window, e.g. 22:00 - 06:00
        time >= start || time <= end
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(days: Vec<Weekday>, start: &str, end: &str) -> DownloadSchedule {
        DownloadSchedule {
            id: crate::types::ScheduleId(1),
            name: "test".to_string(),
            enabled: true,
            days_of_week: days,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    // Treat every case as falling on a Wednesday unless noted.
    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn no_schedules_always_allows() {
        assert!(ScheduleGate::evaluate(&[], Weekday::Wed, at(3, 0)));
    }

    fn all_week() -> Vec<Weekday> {
        vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
    }

    #[test]
    fn normal_window_allows_inside_and_blocks_outside() {
        let schedules = vec![schedule(all_week(), "09:00", "17:00")];
        assert!(ScheduleGate::evaluate(&schedules, Weekday::Wed, at(12, 0)));
        assert!(!ScheduleGate::evaluate(&schedules, Weekday::Wed, at(20, 0)));
    }

    #[test]
    fn overnight_window_wraps_past_midnight() {
        let schedules = vec![schedule(all_week(), "22:00", "06:00")];
        assert!(ScheduleGate::evaluate(&schedules, Weekday::Wed, at(23, 30)));
        assert!(ScheduleGate::evaluate(&schedules, Weekday::Wed, at(2, 0)));
        assert!(!ScheduleGate::evaluate(&schedules, Weekday::Wed, at(12, 0)));
    }

    #[test]
    fn day_filter_excludes_non_matching_days() {
        let schedules = vec![schedule(vec![Weekday::Sat, Weekday::Sun], "00:00", "23:59")];
        assert!(!ScheduleGate::evaluate(&schedules, Weekday::Wed, at(12, 0)));
    }

    #[test]
    fn empty_days_of_week_matches_no_day() {
        let schedules = vec![schedule(vec![], "00:00", "23:59")];
        assert!(!ScheduleGate::evaluate(&schedules, Weekday::Wed, at(12, 0)));
    }

    #[test]
    fn any_matching_schedule_allows_even_if_others_block() {
        let schedules = vec![
            schedule(vec![Weekday::Sat], "00:00", "23:59"),
            schedule(vec![Weekday::Wed], "09:00", "17:00"),
        ];
        assert!(ScheduleGate::evaluate(&schedules, Weekday::Wed, at(12, 0)));
    }
}
