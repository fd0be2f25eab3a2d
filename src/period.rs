//! ## Declared Data Periods
//!
//! Uploaded files rarely say which period they cover, so the user may declare it: one month, a
//! range of months, or a range of dates. [`PeriodMetadata::AutoDetect`] leaves it to the data,
//! which reads the span of the first datetime column (see [`crate::summary::DataPeriod`]).
//!
//! The text form accepted by [`PeriodMetadata::from_str`](std::str::FromStr) is:
//!
//! | Text                        | Period                     |
//! |-----------------------------|----------------------------|
//! | `auto`                      | auto-detect                |
//! | `2023-01`                   | January 2023               |
//! | `2023-01..2023-06`          | January to June 2023       |
//! | `2023-01-01..2023-03-15`    | a date range, inclusive    |

use crate::exceptions::{TripLoaderError, TripLoaderResult};
use chrono::{Month, NaiveDate};
use std::fmt;
use std::str::FromStr;

const MONTHS: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

fn month_from_number(month: u32) -> TripLoaderResult<Month> {
    month
        .checked_sub(1)
        .and_then(|i| MONTHS.get(i as usize))
        .copied()
        .ok_or_else(|| TripLoaderError::InvalidParameter(format!("Invalid month: {}", month)))
}

/// First and last day of a month.
fn month_bounds(month: Month, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month.number_from_month(), 1)?;
    let next = match month {
        Month::December => NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
        _ => NaiveDate::from_ymd_opt(year, month.number_from_month() + 1, 1)?,
    };
    Some((first, next.pred_opt()?))
}

/// The period a dataset covers, as declared by the user or left to detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodMetadata {
    #[default]
    AutoDetect,
    SingleMonth {
        month: Month,
        year: i32,
    },
    MonthRange {
        start_month: Month,
        start_year: i32,
        end_month: Month,
        end_year: i32,
    },
    /// Inclusive on both ends.
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl PeriodMetadata {
    /// One calendar month; `month` is 1-based.
    pub fn single_month(month: u32, year: i32) -> TripLoaderResult<Self> {
        let month = month_from_number(month)?;
        month_bounds(month, year).ok_or_else(|| {
            TripLoaderError::InvalidParameter(format!("Invalid year: {}", year))
        })?;
        Ok(PeriodMetadata::SingleMonth { month, year })
    }

    /// A run of whole months, from `start` to `end` inclusive. Each is `(month, year)`.
    pub fn month_range(start: (u32, i32), end: (u32, i32)) -> TripLoaderResult<Self> {
        let start_month = month_from_number(start.0)?;
        let end_month = month_from_number(end.0)?;
        if (start.1, start.0) > (end.1, end.0) {
            return Err(TripLoaderError::InvalidParameter(format!(
                "Period starts ({:02}/{}) after it ends ({:02}/{})",
                start.0, start.1, end.0, end.1
            )));
        }
        for (month, year) in [(start_month, start.1), (end_month, end.1)] {
            month_bounds(month, year).ok_or_else(|| {
                TripLoaderError::InvalidParameter(format!("Invalid year: {}", year))
            })?;
        }
        Ok(PeriodMetadata::MonthRange {
            start_month,
            start_year: start.1,
            end_month,
            end_year: end.1,
        })
    }

    pub fn date_range(start: NaiveDate, end: NaiveDate) -> TripLoaderResult<Self> {
        if start > end {
            return Err(TripLoaderError::InvalidParameter(format!(
                "Period starts ({}) after it ends ({})",
                start, end
            )));
        }
        Ok(PeriodMetadata::DateRange { start, end })
    }

    pub fn is_auto_detect(&self) -> bool {
        matches!(self, PeriodMetadata::AutoDetect)
    }

    /// First and last day of a declared period; `None` for auto-detect.
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            PeriodMetadata::AutoDetect => None,
            PeriodMetadata::SingleMonth { month, year } => month_bounds(month, year),
            PeriodMetadata::MonthRange {
                start_month,
                start_year,
                end_month,
                end_year,
            } => {
                let (first, _) = month_bounds(start_month, start_year)?;
                let (_, last) = month_bounds(end_month, end_year)?;
                Some((first, last))
            }
            PeriodMetadata::DateRange { start, end } => Some((start, end)),
        }
    }
}

impl fmt::Display for PeriodMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodMetadata::AutoDetect => f.write_str("auto-detected from the data"),
            PeriodMetadata::SingleMonth { month, year } => write!(f, "{} {}", month.name(), year),
            PeriodMetadata::MonthRange {
                start_month,
                start_year,
                end_month,
                end_year,
            } => write!(
                f,
                "{} {} - {} {}",
                start_month.name(),
                start_year,
                end_month.name(),
                end_year
            ),
            PeriodMetadata::DateRange { start, end } => write!(
                f,
                "{} to {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        }
    }
}

fn parse_month(text: &str) -> TripLoaderResult<(u32, i32)> {
    let invalid = || TripLoaderError::InvalidParameter(format!("Expected YYYY-MM, got '{}'", text));
    let (year, month) = text.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    Ok((month, year))
}

fn parse_date(text: &str) -> TripLoaderResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
        TripLoaderError::InvalidParameter(format!("Expected YYYY-MM-DD, got '{}'", text))
    })
}

impl FromStr for PeriodMetadata {
    type Err = TripLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("auto") {
            return Ok(PeriodMetadata::AutoDetect);
        }
        match text.split_once("..") {
            // A date has two dashes, a month one.
            Some((start, end)) if start.matches('-').count() == 2 => {
                Self::date_range(parse_date(start.trim())?, parse_date(end.trim())?)
            }
            Some((start, end)) => {
                Self::month_range(parse_month(start.trim())?, parse_month(end.trim())?)
            }
            None => {
                let (month, year) = parse_month(text)?;
                Self::single_month(month, year)
            }
        }
    }
}
