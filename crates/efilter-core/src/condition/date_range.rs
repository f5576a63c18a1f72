//! Date ranges used by date conditions
//!
//! Named ranges are relative to "today" and are only turned into concrete
//! bounds at evaluation time, with the clock of the evaluation context.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Range relative to the evaluation date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedRange {
    Yesterday,
    Today,
    Tomorrow,
    PreviousYear,
    CurrentYear,
    NextYear,
    PreviousMonth,
    CurrentMonth,
    NextMonth,
    PreviousQuarter,
    CurrentQuarter,
    NextQuarter,
    InPast,
    InFuture,
    Empty,
    NotEmpty,
}

const ALL_NAMED_RANGES: &[NamedRange] = &[
    NamedRange::Yesterday,
    NamedRange::Today,
    NamedRange::Tomorrow,
    NamedRange::PreviousYear,
    NamedRange::CurrentYear,
    NamedRange::NextYear,
    NamedRange::PreviousMonth,
    NamedRange::CurrentMonth,
    NamedRange::NextMonth,
    NamedRange::PreviousQuarter,
    NamedRange::CurrentQuarter,
    NamedRange::NextQuarter,
    NamedRange::InPast,
    NamedRange::InFuture,
    NamedRange::Empty,
    NamedRange::NotEmpty,
];

/// Concrete form of a date range for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRange {
    /// Inclusive bounds, at least one present
    Between(Option<NaiveDate>, Option<NaiveDate>),
    /// `true`: the date must be empty; `false`: it must be set
    Empty(bool),
}

impl NamedRange {
    pub fn name(&self) -> &'static str {
        match self {
            NamedRange::Yesterday => "yesterday",
            NamedRange::Today => "today",
            NamedRange::Tomorrow => "tomorrow",
            NamedRange::PreviousYear => "previous_year",
            NamedRange::CurrentYear => "current_year",
            NamedRange::NextYear => "next_year",
            NamedRange::PreviousMonth => "previous_month",
            NamedRange::CurrentMonth => "current_month",
            NamedRange::NextMonth => "next_month",
            NamedRange::PreviousQuarter => "previous_quarter",
            NamedRange::CurrentQuarter => "current_quarter",
            NamedRange::NextQuarter => "next_quarter",
            NamedRange::InPast => "in_past",
            NamedRange::InFuture => "in_future",
            NamedRange::Empty => "empty",
            NamedRange::NotEmpty => "not_empty",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_NAMED_RANGES.iter().copied().find(|r| r.name() == name)
    }

    /// Concrete bounds relative to `today`
    pub fn resolve(&self, today: NaiveDate) -> Option<ResolvedRange> {
        let day = Duration::days(1);
        let range = match self {
            NamedRange::Yesterday => single_day(today.checked_sub_signed(day)?),
            NamedRange::Today => single_day(today),
            NamedRange::Tomorrow => single_day(today.checked_add_signed(day)?),
            NamedRange::PreviousYear => year_range(today.year() - 1)?,
            NamedRange::CurrentYear => year_range(today.year())?,
            NamedRange::NextYear => year_range(today.year() + 1)?,
            NamedRange::PreviousMonth => month_range(today, -1)?,
            NamedRange::CurrentMonth => month_range(today, 0)?,
            NamedRange::NextMonth => month_range(today, 1)?,
            NamedRange::PreviousQuarter => quarter_range(today, -1)?,
            NamedRange::CurrentQuarter => quarter_range(today, 0)?,
            NamedRange::NextQuarter => quarter_range(today, 1)?,
            NamedRange::InPast => ResolvedRange::Between(None, today.checked_sub_signed(day)),
            NamedRange::InFuture => ResolvedRange::Between(today.checked_add_signed(day), None),
            NamedRange::Empty => ResolvedRange::Empty(true),
            NamedRange::NotEmpty => ResolvedRange::Empty(false),
        };
        Some(range)
    }
}

fn single_day(day: NaiveDate) -> ResolvedRange {
    ResolvedRange::Between(Some(day), Some(day))
}

fn year_range(year: i32) -> Option<ResolvedRange> {
    Some(ResolvedRange::Between(
        Some(NaiveDate::from_ymd_opt(year, 1, 1)?),
        Some(NaiveDate::from_ymd_opt(year, 12, 31)?),
    ))
}

/// Months are counted from year 0 so offsets can cross year boundaries.
fn month_span(absolute_month: i32, length: i32) -> Option<ResolvedRange> {
    let start = NaiveDate::from_ymd_opt(
        absolute_month.div_euclid(12),
        (absolute_month.rem_euclid(12) + 1) as u32,
        1,
    )?;
    let next = absolute_month + length;
    let after = NaiveDate::from_ymd_opt(next.div_euclid(12), (next.rem_euclid(12) + 1) as u32, 1)?;
    Some(ResolvedRange::Between(
        Some(start),
        after.checked_sub_signed(Duration::days(1)),
    ))
}

fn month_range(today: NaiveDate, offset: i32) -> Option<ResolvedRange> {
    let current = today.year() * 12 + today.month0() as i32;
    month_span(current + offset, 1)
}

fn quarter_range(today: NaiveDate, offset: i32) -> Option<ResolvedRange> {
    let quarter_start = today.year() * 12 + (today.month0() as i32 / 3) * 3;
    month_span(quarter_start + offset * 3, 3)
}

/// Date range stored inside a date condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum DateRange {
    Named(NamedRange),
    Custom {
        #[serde(default)]
        start: Option<NaiveDate>,
        #[serde(default)]
        end: Option<NaiveDate>,
    },
}

impl DateRange {
    pub fn named(range: NamedRange) -> Self {
        DateRange::Named(range)
    }

    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange::Custom { start, end }
    }

    /// Concrete bounds relative to `today`
    pub fn resolve(&self, today: NaiveDate) -> Option<ResolvedRange> {
        match self {
            DateRange::Named(named) => named.resolve(today),
            DateRange::Custom { start, end } => Some(ResolvedRange::Between(*start, *end)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_named_range_round_trip_names() {
        for range in ALL_NAMED_RANGES {
            assert_eq!(NamedRange::from_name(range.name()), Some(*range));
        }
        assert_eq!(NamedRange::from_name("last_century"), None);
    }

    #[test]
    fn test_previous_month_crosses_year() {
        let resolved = NamedRange::PreviousMonth.resolve(date(2024, 1, 15));
        assert_eq!(
            resolved,
            Some(ResolvedRange::Between(Some(date(2023, 12, 1)), Some(date(2023, 12, 31))))
        );
    }

    #[test]
    fn test_current_month_leap_february() {
        let resolved = NamedRange::CurrentMonth.resolve(date(2024, 2, 10));
        assert_eq!(
            resolved,
            Some(ResolvedRange::Between(Some(date(2024, 2, 1)), Some(date(2024, 2, 29))))
        );
    }

    #[test]
    fn test_quarters() {
        let today = date(2024, 5, 20);
        assert_eq!(
            NamedRange::CurrentQuarter.resolve(today),
            Some(ResolvedRange::Between(Some(date(2024, 4, 1)), Some(date(2024, 6, 30))))
        );
        assert_eq!(
            NamedRange::NextQuarter.resolve(date(2024, 11, 2)),
            Some(ResolvedRange::Between(Some(date(2025, 1, 1)), Some(date(2025, 3, 31))))
        );
        assert_eq!(
            NamedRange::PreviousQuarter.resolve(date(2024, 2, 2)),
            Some(ResolvedRange::Between(Some(date(2023, 10, 1)), Some(date(2023, 12, 31))))
        );
    }

    #[test]
    fn test_open_ranges() {
        let today = date(2024, 5, 20);
        assert_eq!(
            NamedRange::InPast.resolve(today),
            Some(ResolvedRange::Between(None, Some(date(2024, 5, 19))))
        );
        assert_eq!(NamedRange::Empty.resolve(today), Some(ResolvedRange::Empty(true)));
    }

    #[test]
    fn test_date_range_serde_shape() {
        let named = DateRange::named(NamedRange::CurrentYear);
        assert_eq!(
            serde_json::to_value(&named).unwrap(),
            serde_json::json!({"named": "current_year"})
        );

        let custom: DateRange =
            serde_json::from_value(serde_json::json!({"custom": {"start": "2024-01-01"}})).unwrap();
        assert_eq!(custom, DateRange::between(Some(date(2024, 1, 1)), None));
    }
}
