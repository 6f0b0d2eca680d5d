//! # Trigger
//!
//! Decides, from the current time alone, whether a cycle should fire.
//!
//! [`DailyTrigger`] compares the hour and minute of `now` for equality. It is
//! evaluated at every poll of the scheduling loop (one minute by default), so a
//! poll that is missed for the whole matching minute (process suspended, host
//! asleep) skips that day's cycle. There is no catch-up.
//!
//! The matching minute usually spans several polls. [`Trigger::fire_slot`]
//! names the period a fire belongs to, and the scheduling loop runs at most one
//! cycle per slot.

pub mod error;

pub use error::*;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::fmt::Debug;
use std::str::FromStr;

/// Fire condition evaluated at each poll. Must be free of side effects.
pub trait Trigger: Send + Sync + Debug {
    fn should_fire(&self, now: DateTime<Utc>) -> bool;

    /// The period a fire at `now` belongs to. Two fires in the same slot are
    /// one fire. `None` means every poll is its own period.
    fn fire_slot(&self, _now: DateTime<Utc>) -> Option<NaiveDateTime> {
        None
    }
}

/// Fires during one minute of every UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    hour: u32,
    minute: u32,
}

impl DailyTrigger {
    pub fn new(hour: u32, minute: u32) -> Result<Self, TriggerError> {
        if hour > 23 || minute > 59 {
            return Err(TriggerError::OutOfRange { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    /// 00:00 UTC.
    pub fn midnight() -> Self {
        Self { hour: 0, minute: 0 }
    }

    /// Parses `"HH:MM"`.
    pub fn parse(value: &str) -> Result<Self, TriggerError> {
        let malformed = || TriggerError::Malformed(value.to_string());
        let (hour, minute) = value.trim().split_once(':').ok_or_else(malformed)?;
        let hour = hour.parse::<u32>().map_err(|_| malformed())?;
        let minute = minute.parse::<u32>().map_err(|_| malformed())?;
        Self::new(hour, minute)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl FromStr for DailyTrigger {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Trigger for DailyTrigger {
    fn should_fire(&self, now: DateTime<Utc>) -> bool {
        now.hour() == self.hour && now.minute() == self.minute
    }

    fn fire_slot(&self, now: DateTime<Utc>) -> Option<NaiveDateTime> {
        now.date_naive().and_hms_opt(self.hour, self.minute, 0)
    }
}

/// Fires on every poll tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalTrigger;

impl Trigger for IntervalTrigger {
    fn should_fire(&self, _now: DateTime<Utc>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 29, hour, minute, second).unwrap()
    }

    #[test]
    fn test_midnight_fires_for_the_whole_minute() {
        let trigger = DailyTrigger::midnight();
        assert!(trigger.should_fire(at(0, 0, 0)));
        assert!(trigger.should_fire(at(0, 0, 59)));
        assert!(!trigger.should_fire(at(0, 1, 0)));
        assert!(!trigger.should_fire(at(23, 59, 59)));
        assert!(!trigger.should_fire(at(12, 0, 0)));
    }

    #[test]
    fn test_parse() {
        let trigger: DailyTrigger = "06:30".parse().unwrap();
        assert_eq!((trigger.hour(), trigger.minute()), (6, 30));
        assert!(trigger.should_fire(at(6, 30, 12)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            DailyTrigger::parse("noon"),
            Err(TriggerError::Malformed("noon".to_string()))
        );
        assert!(matches!(DailyTrigger::parse("12:xx"), Err(TriggerError::Malformed(_))));
        assert_eq!(
            DailyTrigger::parse("24:00"),
            Err(TriggerError::OutOfRange { hour: 24, minute: 0 })
        );
        assert!(DailyTrigger::new(10, 60).is_err());
    }

    #[test]
    fn test_fire_slot_is_one_per_day() {
        let trigger = DailyTrigger::midnight();
        assert_eq!(trigger.fire_slot(at(0, 0, 5)), trigger.fire_slot(at(0, 0, 55)));

        let next_day = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 5).unwrap();
        assert_ne!(trigger.fire_slot(at(0, 0, 5)), trigger.fire_slot(next_day));
    }

    #[test]
    fn test_interval_always_fires() {
        assert!(IntervalTrigger.should_fire(at(3, 17, 0)));
        assert_eq!(IntervalTrigger.fire_slot(at(3, 17, 0)), None);
    }
}
