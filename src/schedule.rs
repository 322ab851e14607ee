//! Cron-style schedule for the backup daemon
//!
//! Supports the classic five fields `minute hour day-of-month month
//! day-of-week` with `*`, values, comma lists, `a-b` ranges and `/n` steps.
//! Day-of-week accepts 0-7 where both 0 and 7 mean Sunday. When both the
//! day-of-month and day-of-week fields are restricted, a day matches if
//! either one does, as in Vixie cron. A field starting with `*` (including
//! `*/n`) counts as unrestricted for that rule.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use crate::error::{AgentError, AgentResult};

/// Upper bound on how far ahead `next_after` searches
const SEARCH_DAYS: i64 = 366 * 5;

/// A parsed five-field cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> AgentResult<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(AgentError::Schedule(format!(
                "expected 5 fields in '{}', found {}",
                expr,
                fields.len()
            )));
        }

        let mut days_of_week = parse_field(fields[4], 0, 7)?;
        // Fold 7 onto Sunday
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expr: fields.join(" "),
            minutes: parse_field(fields[0], 0, 59)?,
            hours: parse_field(fields[1], 0, 23)?,
            days_of_month: parse_field(fields[2], 1, 31)?,
            months: parse_field(fields[3], 1, 12)?,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// The normalized expression
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// The first matching minute strictly after `after`, in `after`'s zone
    ///
    /// Local times that do not exist (DST gaps) are skipped. Returns `None`
    /// when nothing matches within five years, e.g. `0 0 31 2 *`.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let mut cursor = after.naive_local();

        loop {
            let candidate = self.next_naive(cursor)?;
            if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
                if resolved > *after {
                    return Some(resolved);
                }
            }
            cursor = candidate;
        }
    }

    fn next_naive(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = start + Duration::days(SEARCH_DAYS);
        let mut t = start;

        while t <= limit {
            if !has_bit(self.months, t.month()) {
                t = first_of_next_month(t.date())?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !has_bit(self.hours, t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if !has_bit(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t);
        }

        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = has_bit(self.days_of_month, date.day());
        let dow = has_bit(self.days_of_week, date.weekday().num_days_from_sunday());

        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

fn has_bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Parse one field into a bitmask of allowed values
fn parse_field(field: &str, min: u32, max: u32) -> AgentResult<u64> {
    let mut mask = 0u64;

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| field_error(field, "invalid step"))?;
                if step == 0 {
                    return Err(field_error(field, "step must be positive"));
                }
                if step > max {
                    return Err(field_error(
                        field,
                        &format!("step must be at most {}", max),
                    ));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, field)?, parse_value(b, field)?)
        } else {
            let value = parse_value(range, field)?;
            // `5/15` means "from 5 to the end, every 15"
            if step > 1 {
                (value, max)
            } else {
                (value, value)
            }
        };

        if lo < min || hi > max || lo > hi {
            return Err(field_error(
                field,
                &format!("values must be within {}-{}", min, max),
            ));
        }

        let mut v = lo;
        while v <= hi {
            mask |= 1u64 << v;
            match v.checked_add(step) {
                Some(next) => v = next,
                None => break,
            }
        }
    }

    Ok(mask)
}

fn parse_value(value: &str, field: &str) -> AgentResult<u32> {
    value
        .parse()
        .map_err(|_| field_error(field, &format!("'{}' is not a number", value)))
}

fn field_error(field: &str, reason: &str) -> AgentError {
    AgentError::Schedule(format!("invalid cron field '{}': {}", field, reason))
}
