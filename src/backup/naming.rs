//! Artifact naming
//!
//! Artifacts are named `backup-YYYYMMDD-HHMMSS.tar.zst` in UTC. The fixed
//! width digits make lexical order equal creation order, and the name is
//! the only place the creation time is recorded.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

use crate::error::{AgentError, AgentResult};

pub const ARTIFACT_PREFIX: &str = "backup-";
pub const ARTIFACT_EXTENSION: &str = ".tar.zst";

const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const STAMP_LEN: usize = 15;

/// ISO-8601 week bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    /// ISO week-numbering year, which differs from the calendar year
    /// around January 1st
    pub year: i32,
    pub week: u32,
}

/// Calendar month bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

/// Build the artifact name for a creation time
///
/// Sub-second precision is dropped.
pub fn format_name(timestamp: DateTime<Utc>) -> String {
    format!(
        "{}{}{}",
        ARTIFACT_PREFIX,
        timestamp.format(STAMP_FORMAT),
        ARTIFACT_EXTENSION
    )
}

/// Recover the creation time from an artifact name
pub fn parse_name(name: &str) -> AgentResult<DateTime<Utc>> {
    let malformed = || AgentError::MalformedName(name.to_string());

    let stamp = name
        .strip_prefix(ARTIFACT_PREFIX)
        .and_then(|rest| rest.strip_suffix(ARTIFACT_EXTENSION))
        .ok_or_else(malformed)?;

    // chrono accepts signed and variable-width years, so pin the shape first
    let well_formed = stamp.len() == STAMP_LEN
        && stamp.char_indices().all(|(i, c)| {
            if i == 8 {
                c == '-'
            } else {
                c.is_ascii_digit()
            }
        });
    if !well_formed {
        return Err(malformed());
    }

    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).map_err(|_| malformed())?;
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

pub fn week_key(timestamp: DateTime<Utc>) -> WeekKey {
    let iso = timestamp.iso_week();
    WeekKey {
        year: iso.year(),
        week: iso.week(),
    }
}

pub fn month_key(timestamp: DateTime<Utc>) -> MonthKey {
    MonthKey {
        year: timestamp.year(),
        month: timestamp.month(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_name() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 27, 14, 30, 22).unwrap();
        assert_eq!(format_name(ts), "backup-20251127-143022.tar.zst");
    }

    #[test]
    fn test_round_trip_truncates_to_seconds() {
        let start = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        for offset in [0, 1, 3_600, 86_399, 10_000_000] {
            let ts = start + Duration::seconds(offset);
            assert_eq!(parse_name(&format_name(ts)).unwrap(), ts);
        }

        let with_millis = start + Duration::milliseconds(456);
        assert_eq!(parse_name(&format_name(with_millis)).unwrap(), start);
    }

    #[test]
    fn test_names_sort_by_creation_time() {
        let earlier = Utc.with_ymd_and_hms(2024, 9, 30, 23, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 10, 1, 1, 0, 0).unwrap();
        assert!(format_name(earlier) < format_name(later));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        for name in [
            "stray.txt",
            "backup-20251127-143022.json",
            "backup-20251127-143022",
            "backup-2025112-143022.tar.zst",
            "backup-+2025112-43022.tar.zst",
            "backup-20251127_143022.tar.zst",
            "backup-20251327-143022.tar.zst",
            "backup-20251127-253022.tar.zst",
            "snapshot-20251127-143022.tar.zst",
        ] {
            let err = parse_name(name).unwrap_err();
            assert!(matches!(err, AgentError::MalformedName(_)), "{}", name);
        }
    }

    #[test]
    fn test_week_key_across_year_boundary() {
        // 2024-12-30 (Monday) belongs to ISO week 1 of 2025
        let ts = Utc.with_ymd_and_hms(2024, 12, 30, 3, 0, 0).unwrap();
        assert_eq!(week_key(ts), WeekKey { year: 2025, week: 1 });

        // 2021-01-03 (Sunday) belongs to ISO week 53 of 2020
        let ts = Utc.with_ymd_and_hms(2021, 1, 3, 3, 0, 0).unwrap();
        assert_eq!(week_key(ts), WeekKey { year: 2020, week: 53 });
    }

    #[test]
    fn test_weeks_run_monday_to_sunday() {
        let sunday = Utc.with_ymd_and_hms(2024, 5, 12, 23, 59, 59).unwrap();
        let monday = Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap();
        let prev_monday = Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap();
        assert_eq!(week_key(sunday), week_key(prev_monday));
        assert_ne!(week_key(sunday), week_key(monday));
    }

    #[test]
    fn test_month_key() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 30, 3, 0, 0).unwrap();
        assert_eq!(month_key(ts), MonthKey { year: 2024, month: 12 });
    }
}
