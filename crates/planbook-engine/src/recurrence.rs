//! Recurrence expansion.
//!
//! A frequency spec is an optional leading integer (default 1) plus a
//! unit — `day(s)`, `week(s)`, `month(s)`, `year(s)` or `daily`,
//! `weekly`, `monthly`, `yearly` — case-insensitive, normalized to
//! singular. Expansion walks forward from the base start, preserving the
//! base duration verbatim on every occurrence; month and year steps are
//! calendar-aware and clamp the day of month (Jan 31 + 1 month =
//! Feb 28), with the clamp propagating through later steps.

use chrono::{DateTime, Duration, Months, Utc};
use planbook_core::error::{PlanbookError, PlanbookResult};
use planbook_core::models::task::Schedule;
use thiserror::Error;

/// Hard ceiling on occurrences per series. A `task_period` far beyond a
/// short interval would otherwise expand without bound.
pub const MAX_SERIES_INSTANCES: usize = 1000;

/// A frequency spec that could not be parsed. Surfaced to callers as a
/// validation failure rather than silently truncating the series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized repeat frequency: '{0}'")]
pub struct InvalidFrequency(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub interval: u32,
    pub unit: FrequencyUnit,
}

impl Frequency {
    /// Parse a frequency spec such as `"daily"`, `"2 weeks"` or
    /// `"3 Months"`. A zero interval is rejected — it would never
    /// advance.
    pub fn parse(input: &str) -> Result<Self, InvalidFrequency> {
        let normalized = input.trim().to_ascii_lowercase();

        let digits_end = normalized
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(normalized.len());
        let (digits, rest) = normalized.split_at(digits_end);

        let interval = if digits.is_empty() {
            1
        } else {
            digits
                .parse::<u32>()
                .map_err(|_| InvalidFrequency(input.to_string()))?
        };
        if interval == 0 {
            return Err(InvalidFrequency(input.to_string()));
        }

        let unit_token = rest.trim();
        let singular = unit_token.strip_suffix('s').unwrap_or(unit_token);
        let unit = match singular {
            "day" | "daily" => FrequencyUnit::Day,
            "week" | "weekly" => FrequencyUnit::Week,
            "month" | "monthly" => FrequencyUnit::Month,
            "year" | "yearly" => FrequencyUnit::Year,
            _ => return Err(InvalidFrequency(input.to_string())),
        };

        Ok(Self { interval, unit })
    }

    /// Advance a date by one frequency step.
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self.unit {
            FrequencyUnit::Day => from + Duration::days(i64::from(self.interval)),
            FrequencyUnit::Week => from + Duration::weeks(i64::from(self.interval)),
            FrequencyUnit::Month => from + Months::new(self.interval),
            FrequencyUnit::Year => from + Months::new(self.interval * 12),
        }
    }
}

/// Expand a base schedule into the occurrences of its series.
///
/// Every advanced start strictly after the base start and no later than
/// `period_end` yields one occurrence with the base duration; the base
/// occurrence itself is never re-emitted.
pub fn expand_occurrences(
    schedule: &Schedule,
    frequency: Frequency,
    period_end: DateTime<Utc>,
) -> PlanbookResult<Vec<Schedule>> {
    let end = schedule
        .end
        .ok_or_else(|| PlanbookError::validation("a recurring task requires a schedule end"))?;
    let duration = end - schedule.start;

    let mut occurrences = Vec::new();
    let mut current = schedule.start;
    loop {
        current = frequency.advance(current);
        if current > period_end {
            break;
        }
        if occurrences.len() >= MAX_SERIES_INSTANCES {
            return Err(PlanbookError::validation(format!(
                "recurrence expands to more than {MAX_SERIES_INSTANCES} instances"
            )));
        }
        occurrences.push(Schedule {
            start: current,
            end: Some(current + duration),
            timezone: schedule.timezone.clone(),
        });
    }

    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn parses_bare_units_and_adverbs() {
        assert_eq!(
            Frequency::parse("daily").unwrap(),
            Frequency {
                interval: 1,
                unit: FrequencyUnit::Day
            }
        );
        assert_eq!(
            Frequency::parse("week").unwrap(),
            Frequency {
                interval: 1,
                unit: FrequencyUnit::Week
            }
        );
        assert_eq!(
            Frequency::parse("2 weeks").unwrap(),
            Frequency {
                interval: 2,
                unit: FrequencyUnit::Week
            }
        );
        assert_eq!(
            Frequency::parse("  3 MONTHS ").unwrap(),
            Frequency {
                interval: 3,
                unit: FrequencyUnit::Month
            }
        );
        assert_eq!(
            Frequency::parse("yearly").unwrap(),
            Frequency {
                interval: 1,
                unit: FrequencyUnit::Year
            }
        );
    }

    #[test]
    fn rejects_unknown_units_and_zero_intervals() {
        assert!(Frequency::parse("fortnightly").is_err());
        assert!(Frequency::parse("").is_err());
        assert!(Frequency::parse("0 days").is_err());
        assert!(Frequency::parse("5").is_err());
    }

    #[test]
    fn month_advance_clamps_day_of_month() {
        let freq = Frequency {
            interval: 1,
            unit: FrequencyUnit::Month,
        };
        let advanced = freq.advance(date(2026, 1, 31, 9));
        assert_eq!(advanced, date(2026, 2, 28, 9));
        // The clamp propagates: the next step advances from Feb 28.
        assert_eq!(freq.advance(advanced), date(2026, 3, 28, 9));
    }

    #[test]
    fn expansion_preserves_duration() {
        let schedule = Schedule::new(date(2026, 3, 2, 9), date(2026, 3, 2, 10));
        let freq = Frequency::parse("weekly").unwrap();
        let occurrences =
            expand_occurrences(&schedule, freq, date(2026, 3, 30, 23)).unwrap();

        assert_eq!(occurrences.len(), 4);
        for occ in &occurrences {
            assert_eq!(occ.end.unwrap() - occ.start, Duration::hours(1));
        }
        assert_eq!(occurrences[0].start, date(2026, 3, 9, 9));
        assert_eq!(occurrences[3].start, date(2026, 3, 30, 9));
    }

    #[test]
    fn base_occurrence_is_never_re_emitted() {
        let schedule = Schedule::new(date(2026, 3, 2, 9), date(2026, 3, 2, 10));
        let freq = Frequency::parse("daily").unwrap();
        let occurrences = expand_occurrences(&schedule, freq, date(2026, 3, 4, 23)).unwrap();

        assert!(occurrences.iter().all(|o| o.start > schedule.start));
        assert_eq!(occurrences.len(), 2);
    }

    #[test]
    fn period_end_is_inclusive() {
        let schedule = Schedule::new(date(2026, 3, 2, 9), date(2026, 3, 2, 10));
        let freq = Frequency::parse("daily").unwrap();
        // period_end exactly at an advanced start includes that occurrence
        let occurrences = expand_occurrences(&schedule, freq, date(2026, 3, 3, 9)).unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].start, date(2026, 3, 3, 9));
    }

    #[test]
    fn period_before_first_advance_yields_no_occurrences() {
        let schedule = Schedule::new(date(2026, 3, 2, 9), date(2026, 3, 2, 10));
        let freq = Frequency::parse("weekly").unwrap();
        let occurrences = expand_occurrences(&schedule, freq, date(2026, 3, 5, 0)).unwrap();
        assert!(occurrences.is_empty());
    }

    #[test]
    fn runaway_expansion_is_rejected() {
        let schedule = Schedule::new(date(2026, 1, 1, 9), date(2026, 1, 1, 10));
        let freq = Frequency::parse("daily").unwrap();
        let result = expand_occurrences(&schedule, freq, date(2030, 1, 1, 0));
        assert!(matches!(
            result,
            Err(PlanbookError::Validation { .. })
        ));
    }
}
