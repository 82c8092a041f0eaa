//! Shift Clock
//!
//! Maps a wall-clock timestamp to the active shift window and detects
//! shift-boundary crossings. Pure functions of the timestamp: no I/O, no
//! failure modes.
//!
//! ## Shift Layout
//!
//! ```text
//! 08:30 ─────────── Day ─────────── 17:30 ── extension ── 20:30 ── Night ── 08:30(+1)
//!         lunch 12:00-13:00               dinner 18:00-18:30      00:00-00:30
//!                                                                  04:00-05:00
//! ```
//!
//! A Day window is "extended" once the clock passes 17:30; the extension
//! keeps the same start, so it is not a shift crossing. Times are naive
//! local wall-clock values on a fixed 24 h day (no DST adjustment).

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::ShiftType;

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// Day shift start (also night shift end)
pub fn day_start() -> NaiveTime {
    hm(8, 30)
}

/// Basic day shift end, and the extension threshold
pub fn day_basic_end() -> NaiveTime {
    hm(17, 30)
}

/// Extended day shift end (also night shift start)
pub fn night_start() -> NaiveTime {
    hm(20, 30)
}

/// Half-open time-of-day break interval
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl BreakInterval {
    fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Whether the time of day falls inside the break
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }

    /// Break length in seconds
    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Active shift window: `[start, end)` plus its break schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShiftWindow {
    pub shift_type: ShiftType,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub is_extended: bool,
    pub breaks: Vec<BreakInterval>,
}

impl ShiftWindow {
    /// Date the window started on; the persistence key for the shift
    pub fn shift_date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Whether `at` falls inside `[start, end)`
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether `at` falls inside one of the window's breaks
    pub fn is_break(&self, at: NaiveDateTime) -> bool {
        self.contains(at) && self.breaks.iter().any(|b| b.contains(at.time()))
    }

    /// Window length minus scheduled breaks
    pub fn planned_seconds(&self) -> i64 {
        let length = (self.end - self.start).num_seconds();
        let breaks: i64 = self.breaks.iter().map(BreakInterval::seconds).sum();
        length - breaks
    }
}

/// Source of wall-clock time for the monitor loop
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Stateless shift calendar
pub struct ShiftClock;

impl ShiftClock {
    /// Shift window active at `now`.
    ///
    /// `[08:30, 20:30)` is Day (extended from 17:30 on); everything else is
    /// Night, which started at 20:30 either today or yesterday.
    pub fn current_window(now: NaiveDateTime) -> ShiftWindow {
        let time = now.time();
        let date = now.date();

        if time >= day_start() && time < night_start() {
            let is_extended = time >= day_basic_end();
            let mut breaks = vec![BreakInterval::new(hm(12, 0), hm(13, 0))];
            let end_time = if is_extended {
                breaks.push(BreakInterval::new(hm(18, 0), hm(18, 30)));
                night_start()
            } else {
                day_basic_end()
            };

            return ShiftWindow {
                shift_type: ShiftType::Day,
                start: date.and_time(day_start()),
                end: date.and_time(end_time),
                is_extended,
                breaks,
            };
        }

        let start_date = if time >= night_start() {
            date
        } else {
            date - Duration::days(1)
        };

        ShiftWindow {
            shift_type: ShiftType::Night,
            start: start_date.and_time(night_start()),
            end: (start_date + Duration::days(1)).and_time(day_start()),
            is_extended: false,
            breaks: vec![
                BreakInterval::new(hm(0, 0), hm(0, 30)),
                BreakInterval::new(hm(4, 0), hm(5, 0)),
            ],
        }
    }

    /// Window for a persisted shift key.
    ///
    /// Day windows are returned in their extended form since a record may
    /// have been written after 17:30.
    pub fn window_for(shift_date: NaiveDate, shift_type: ShiftType) -> ShiftWindow {
        match shift_type {
            ShiftType::Day => Self::current_window(shift_date.and_time(day_basic_end())),
            ShiftType::Night => Self::current_window(shift_date.and_time(night_start())),
        }
    }

    /// True when `current` is a different shift than `previous`.
    pub fn has_crossed(previous: &ShiftWindow, current: &ShiftWindow) -> bool {
        previous.shift_type != current.shift_type || previous.start.date() != current.start.date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_just_before_day_start_is_previous_night() {
        let w = ShiftClock::current_window(at(10, 8, 29, 59));
        assert_eq!(w.shift_type, ShiftType::Night);
        assert_eq!(w.start, at(9, 20, 30, 0));
        assert_eq!(w.end, at(10, 8, 30, 0));
        assert!(!w.is_extended);
        assert_eq!(w.shift_date(), at(9, 0, 0, 0).date());
    }

    #[test]
    fn test_day_start_is_day_window() {
        let w = ShiftClock::current_window(at(10, 8, 30, 0));
        assert_eq!(w.shift_type, ShiftType::Day);
        assert_eq!(w.start, at(10, 8, 30, 0));
        assert_eq!(w.end, at(10, 17, 30, 0));
        assert!(!w.is_extended);
        assert_eq!(w.breaks.len(), 1);
    }

    #[test]
    fn test_extended_day_after_basic_end() {
        let w = ShiftClock::current_window(at(10, 17, 30, 0));
        assert_eq!(w.shift_type, ShiftType::Day);
        assert!(w.is_extended);
        assert_eq!(w.end, at(10, 20, 30, 0));
        assert_eq!(w.breaks.len(), 2);
        assert!(w.is_break(at(10, 18, 10, 0)));
        assert!(!w.is_break(at(10, 18, 30, 0)));
    }

    #[test]
    fn test_evening_night_window_ends_tomorrow() {
        let w = ShiftClock::current_window(at(10, 20, 30, 0));
        assert_eq!(w.shift_type, ShiftType::Night);
        assert_eq!(w.start, at(10, 20, 30, 0));
        assert_eq!(w.end, at(11, 8, 30, 0));
        assert!(w.is_break(at(11, 4, 30, 0)));
    }

    #[test]
    fn test_extension_is_not_a_crossing() {
        let basic = ShiftClock::current_window(at(10, 17, 29, 59));
        let extended = ShiftClock::current_window(at(10, 17, 30, 0));
        assert!(!ShiftClock::has_crossed(&basic, &extended));
    }

    #[test]
    fn test_crossings() {
        let day = ShiftClock::current_window(at(10, 20, 29, 59));
        let night = ShiftClock::current_window(at(10, 20, 30, 0));
        let night_after_midnight = ShiftClock::current_window(at(11, 1, 0, 0));
        let next_day = ShiftClock::current_window(at(11, 8, 30, 0));

        assert!(ShiftClock::has_crossed(&day, &night));
        assert!(!ShiftClock::has_crossed(&night, &night_after_midnight));
        assert!(ShiftClock::has_crossed(&night_after_midnight, &next_day));
        assert!(ShiftClock::has_crossed(&day, &next_day));
    }

    #[test]
    fn test_planned_seconds() {
        let basic_day = ShiftClock::current_window(at(10, 9, 0, 0));
        assert_eq!(basic_day.planned_seconds(), 8 * 3600);

        let night = ShiftClock::current_window(at(10, 23, 0, 0));
        assert_eq!(night.planned_seconds(), 12 * 3600 - 90 * 60);
    }

    #[test]
    fn test_window_for_key() {
        let date = at(10, 0, 0, 0).date();
        let day = ShiftClock::window_for(date, ShiftType::Day);
        assert_eq!(day.start, at(10, 8, 30, 0));
        assert!(day.is_extended);

        let night = ShiftClock::window_for(date, ShiftType::Night);
        assert_eq!(night.start, at(10, 20, 30, 0));
        assert_eq!(night.end, at(11, 8, 30, 0));
    }
}
