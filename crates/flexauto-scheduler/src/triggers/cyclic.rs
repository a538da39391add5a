//! Fixed-interval trigger.
//!
//! Parameters: `Interval` (positive integer) and `Unit` (seconds, minutes,
//! hours or days; English or Ukrainian names, minutes when absent).

use chrono::{DateTime, TimeDelta, Utc};

use flexauto_core::error::{FlexError, Result};

use crate::block::BlockHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("seconds" | "second" | "секунди" | "секунд") => IntervalUnit::Seconds,
            Some("hours" | "hour" | "години" | "годин") => IntervalUnit::Hours,
            Some("days" | "day" | "дні" | "днів") => IntervalUnit::Days,
            _ => IntervalUnit::Minutes,
        }
    }

    fn delta(self, amount: i64) -> Option<TimeDelta> {
        match self {
            IntervalUnit::Seconds => TimeDelta::try_seconds(amount),
            IntervalUnit::Minutes => TimeDelta::try_minutes(amount),
            IntervalUnit::Hours => TimeDelta::try_hours(amount),
            IntervalUnit::Days => TimeDelta::try_days(amount),
        }
    }
}

#[derive(Debug)]
pub struct CyclicTrigger {
    pub header: BlockHeader,
    next_fire: Option<DateTime<Utc>>,
}

impl CyclicTrigger {
    pub fn new(header: BlockHeader) -> Self {
        Self { header, next_fire: None }
    }

    pub fn interval(&self) -> Result<TimeDelta> {
        let raw = self.header.require("Interval")?.trim();
        let amount: i64 = raw
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| FlexError::Block(format!("CyclicTrigger: invalid interval '{raw}'")))?;
        IntervalUnit::parse(self.header.param("Unit"))
            .delta(amount)
            .ok_or_else(|| FlexError::Block(format!("CyclicTrigger: interval '{raw}' out of range")))
    }

    pub(crate) fn should_fire(&mut self, last_executed: Option<DateTime<Utc>>) -> Result<bool> {
        self.fires_at(Utc::now(), last_executed)
    }

    /// Pure evaluation against an explicit clock.
    ///
    /// The first evaluation seeds the schedule from `last_executed + interval`
    /// (or `now` when the scenario never ran). After a firing the next point
    /// is `now + interval`, so missed cycles are not replayed.
    pub fn fires_at(
        &mut self,
        now: DateTime<Utc>,
        last_executed: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let interval = self.interval()?;
        let next = *self
            .next_fire
            .get_or_insert_with(|| last_executed.map(|t| t + interval).unwrap_or(now));

        if now >= next {
            self.next_fire = Some(now + interval);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
