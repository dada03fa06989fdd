//! Minimal recurrence evaluator.
//!
//! Supports exactly one form: `*/N * * * *` — "every N minutes", anchored
//! at the top of the hour (minutes 0, N, 2N, ... below 60, then the next
//! hour's 0). This is a deliberate simplification, not a cron
//! implementation; anything else is rejected at parse time so a task can
//! never sit armed with an expression that will silently never fire. The
//! `parse`/`next_after` contract is the seam where a full cron strategy
//! could be substituted.

use chrono::{DateTime, Duration, Timelike, Utc};
use prowl_core::error::TaskError;

/// A parsed "every N minutes" recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    every_minutes: u32,
}

impl Recurrence {
    /// Parse a recurrence expression.
    ///
    /// Accepts `*/N * * * *` with 1 <= N <= 59; the four trailing fields
    /// must be `*`. Everything else is `TaskError::UnsupportedRecurrence`.
    pub fn parse(expr: &str) -> Result<Self, TaskError> {
        let unsupported = || TaskError::UnsupportedRecurrence(expr.to_string());

        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(unsupported());
        }
        if fields[1..].iter().any(|f| *f != "*") {
            return Err(unsupported());
        }

        let step = fields[0].strip_prefix("*/").ok_or_else(unsupported)?;
        let every_minutes: u32 = step.parse().map_err(|_| unsupported())?;
        if every_minutes == 0 || every_minutes > 59 {
            return Err(unsupported());
        }

        Ok(Self { every_minutes })
    }

    /// The interval length in minutes.
    pub fn every_minutes(&self) -> u32 {
        self.every_minutes
    }

    /// The next minute boundary after `now` that is a multiple of N,
    /// seconds and sub-seconds truncated to zero.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let minute = now.minute();
        let top_of_hour = now
            - Duration::minutes(minute as i64)
            - Duration::seconds(now.second() as i64)
            - Duration::nanoseconds(now.nanosecond() as i64);

        let step = ((minute / self.every_minutes) + 1) * self.every_minutes;
        if step < 60 {
            top_of_hour + Duration::minutes(step as i64)
        } else {
            // Boundaries re-anchor at the top of each hour
            top_of_hour + Duration::hours(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    #[test]
    fn parse_every_five_minutes() {
        let rec = Recurrence::parse("*/5 * * * *").unwrap();
        assert_eq!(rec.every_minutes(), 5);
    }

    #[test]
    fn parse_rejects_general_cron() {
        assert!(Recurrence::parse("0 9 * * 1-5").is_err());
        assert!(Recurrence::parse("*/5 2 * * *").is_err());
        assert!(Recurrence::parse("30 * * * *").is_err());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Recurrence::parse("").is_err());
        assert!(Recurrence::parse("*/x * * * *").is_err());
        assert!(Recurrence::parse("*/0 * * * *").is_err());
        assert!(Recurrence::parse("*/60 * * * *").is_err());
        assert!(Recurrence::parse("*/5 * * *").is_err());
    }

    #[test]
    fn next_after_advances_to_boundary() {
        // Created at 12:01:00 with a 5-minute interval -> 12:05:00
        let rec = Recurrence::parse("*/5 * * * *").unwrap();
        assert_eq!(rec.next_after(at(12, 1, 0)), at(12, 5, 0));
    }

    #[test]
    fn next_after_on_boundary_moves_to_following() {
        let rec = Recurrence::parse("*/5 * * * *").unwrap();
        assert_eq!(rec.next_after(at(12, 5, 0)), at(12, 10, 0));
    }

    #[test]
    fn next_after_truncates_seconds() {
        let rec = Recurrence::parse("*/5 * * * *").unwrap();
        let next = rec.next_after(at(12, 4, 37));
        assert_eq!(next, at(12, 5, 0));
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn next_after_rolls_into_next_hour() {
        let rec = Recurrence::parse("*/5 * * * *").unwrap();
        assert_eq!(rec.next_after(at(12, 57, 10)), at(13, 0, 0));
    }

    #[test]
    fn next_after_reanchors_when_interval_does_not_divide_sixty() {
        // */7 yields 0, 7, ..., 56, then the next hour's 0 — never :03
        let rec = Recurrence::parse("*/7 * * * *").unwrap();
        assert_eq!(rec.next_after(at(12, 55, 0)), at(12, 56, 0));
        assert_eq!(rec.next_after(at(12, 56, 0)), at(13, 0, 0));
    }
}
