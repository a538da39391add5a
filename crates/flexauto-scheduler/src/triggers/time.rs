//! Time-of-day trigger with an optional weekday filter.
//!
//! Parameters: `Time` (`HH:MM` or `HH:MM:SS`, local time) and `Days`
//! (comma-separated weekday names, empty for every day).
//!
//! Fires at most once per day. The reference point is the later of the
//! scenario's last execution and the trigger's own last firing; the trigger
//! fires once the clock passes today's target and the reference lies before
//! it. With no reference at all it only fires within the first minute after
//! the target, so a freshly added scenario does not run retroactively.

use chrono::{DateTime, Datelike, Local, NaiveDateTime, NaiveTime, Utc, Weekday};

use flexauto_core::error::{FlexError, Result};

use crate::block::BlockHeader;

const FRESH_WINDOW_SECS: i64 = 60;

#[derive(Debug)]
pub struct TimeTrigger {
    pub header: BlockHeader,
    last_fired: Option<NaiveDateTime>,
}

impl TimeTrigger {
    pub fn new(header: BlockHeader) -> Self {
        Self { header, last_fired: None }
    }

    /// Target time of day.
    pub fn target(&self) -> Result<NaiveTime> {
        let raw = self.header.require("Time")?.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|_| FlexError::Block(format!("TimeTrigger: invalid time '{raw}'")))
    }

    /// Allowed weekdays; empty means every day. Unknown names are skipped.
    pub fn days(&self) -> Vec<Weekday> {
        self.header
            .param("Days")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|d| d.trim().parse::<Weekday>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn should_fire(&mut self, last_executed: Option<DateTime<Utc>>) -> Result<bool> {
        let now = Local::now().naive_local();
        let last = last_executed.map(|t| t.with_timezone(&Local).naive_local());
        self.fires_at(now, last)
    }

    /// Pure evaluation against an explicit local clock.
    pub fn fires_at(
        &mut self,
        now: NaiveDateTime,
        last_executed: Option<NaiveDateTime>,
    ) -> Result<bool> {
        let target = self.target()?;
        let days = self.days();
        if !days.is_empty() && !days.contains(&now.weekday()) {
            return Ok(false);
        }

        let today_target = now.date().and_time(target);
        if now < today_target {
            return Ok(false);
        }

        let reference = match (last_executed, self.last_fired) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let fire = match reference {
            Some(r) => r < today_target,
            None => (now - today_target).num_seconds() < FRESH_WINDOW_SECS,
        };

        if fire {
            self.last_fired = Some(now);
        }
        Ok(fire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trigger(time: &str, days: &str) -> TimeTrigger {
        TimeTrigger::new(
            BlockHeader::new("TimeTrigger")
                .with_param("Time", time)
                .with_param("Days", days),
        )
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_fires_once_per_day() {
        let mut t = trigger("09:00", "");
        assert!(!t.fires_at(at(2026, 3, 2, 8, 59, 59), None).unwrap());
        assert!(t.fires_at(at(2026, 3, 2, 9, 0, 1), None).unwrap());
        // Own last firing suppresses the rest of the day.
        assert!(!t.fires_at(at(2026, 3, 2, 9, 0, 2), None).unwrap());
        assert!(!t.fires_at(at(2026, 3, 2, 18, 0, 0), None).unwrap());
        // Next day fires again.
        assert!(t.fires_at(at(2026, 3, 3, 9, 0, 0), None).unwrap());
    }

    #[test]
    fn test_catches_up_after_missed_target() {
        let mut t = trigger("09:00:00", "");
        let yesterday = at(2026, 3, 1, 9, 0, 5);
        assert!(t.fires_at(at(2026, 3, 2, 13, 30, 0), Some(yesterday)).unwrap());
    }

    #[test]
    fn test_last_run_before_target_fires() {
        let mut t = trigger("09:00", "");
        let before = at(2026, 3, 2, 8, 59, 30);
        assert!(t.fires_at(at(2026, 3, 2, 9, 0, 5), Some(before)).unwrap());
    }

    #[test]
    fn test_fresh_window_without_history() {
        let mut inside = trigger("09:00", "");
        assert!(inside.fires_at(at(2026, 3, 2, 9, 0, 45), None).unwrap());

        let mut outside = trigger("09:00", "");
        assert!(!outside.fires_at(at(2026, 3, 2, 9, 1, 5), None).unwrap());
    }

    #[test]
    fn test_no_retroactive_fire_without_history() {
        let mut t = trigger("09:00", "");
        assert!(!t.fires_at(at(2026, 3, 2, 9, 1, 0), None).unwrap());
    }

    #[test]
    fn test_executed_today_suppresses() {
        let mut t = trigger("09:00", "");
        let earlier = at(2026, 3, 2, 9, 0, 3);
        assert!(!t.fires_at(at(2026, 3, 2, 9, 0, 30), Some(earlier)).unwrap());
    }

    #[test]
    fn test_weekday_filter() {
        // 2026-03-02 is a Monday.
        let mut t = trigger("09:00", "Tuesday, Friday");
        assert!(!t.fires_at(at(2026, 3, 2, 9, 0, 0), None).unwrap());
        assert!(t.fires_at(at(2026, 3, 3, 9, 0, 0), None).unwrap());
        assert_eq!(t.days(), vec![Weekday::Tue, Weekday::Fri]);
    }

    #[test]
    fn test_invalid_time_is_error() {
        let mut t = trigger("25:99", "");
        assert!(t.fires_at(at(2026, 3, 2, 9, 0, 0), None).is_err());
        let mut missing = TimeTrigger::new(BlockHeader::new("TimeTrigger"));
        assert!(missing.fires_at(at(2026, 3, 2, 9, 0, 0), None).is_err());
    }
}
