use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::{ColumnTrait, Condition};

use crate::error::AppError;

/// Month options shown next to the year dropdown.
pub const MONTHS: [(u32, &str); 12] = [
    (1, "January"),
    (2, "February"),
    (3, "March"),
    (4, "April"),
    (5, "May"),
    (6, "June"),
    (7, "July"),
    (8, "August"),
    (9, "September"),
    (10, "October"),
    (11, "November"),
    (12, "December"),
];

/// Year and/or month restriction on an event start time.
///
/// Translated into half-open UTC ranges so the same filter works on every
/// database backend. A month without a year matches that month in any of the
/// years that actually contain events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl DateFilter {
    pub fn new(year: Option<i32>, month: Option<u32>) -> Result<Self, AppError> {
        if let Some(month) = month
            && !(1..=12).contains(&month)
        {
            return Err(AppError::Validation("Month must be between 1 and 12".into()));
        }
        if let Some(year) = year
            && !(1900..=9999).contains(&year)
        {
            return Err(AppError::Validation(
                "Year must be between 1900 and 9999".into(),
            ));
        }
        Ok(Self { year, month })
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none()
    }

    /// Half-open `[start, end)` ranges covered by the filter.
    ///
    /// `known_years` is only consulted for a month-only filter.
    pub fn ranges(&self, known_years: &[i32]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.year, self.month) {
            (None, None) => Vec::new(),
            (Some(year), None) => year_range(year).into_iter().collect(),
            (Some(year), Some(month)) => month_range(year, month).into_iter().collect(),
            (None, Some(month)) => known_years
                .iter()
                .filter_map(|&year| month_range(year, month))
                .collect(),
        }
    }

    /// SQL condition on `column`, or `None` when the filter is empty.
    ///
    /// A non-empty filter with no covering range matches no rows.
    pub fn condition<C: ColumnTrait>(&self, column: C, known_years: &[i32]) -> Option<Condition> {
        if self.is_empty() {
            return None;
        }
        let ranges = self.ranges(known_years);
        if ranges.is_empty() {
            return Some(Condition::all().add(Expr::val(1).eq(0)));
        }
        let condition = ranges
            .into_iter()
            .fold(Condition::any(), |cond, (start, end)| {
                cond.add(
                    Condition::all()
                        .add(column.gte(start))
                        .add(column.lt(end)),
                )
            });
        Some(condition)
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn year_range(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = midnight(NaiveDate::from_ymd_opt(year, 1, 1)?)?;
    let end = midnight(NaiveDate::from_ymd_opt(year + 1, 1, 1)?)?;
    Some((start, end))
}

fn month_range(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = midnight(NaiveDate::from_ymd_opt(year, month, 1)?)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = midnight(NaiveDate::from_ymd_opt(next_year, next_month, 1)?)?;
    Some((start, end))
}
