//! Delivery-window calculation for batched alert rates.
//!
//! Given a cadence and the date a batch run is anchored on, computes the
//! inclusive date range that counts as "new since the last run". Consecutive
//! runs of the same rate tile the calendar with no gaps or overlaps.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{AlertError, Result};
use crate::types::Rate;

/// Monthly runs are refused after this day of the month: days 29-31 do not
/// exist in every month, and anchoring on them would make the schedule drift.
pub const MONTHLY_LAST_VALID_DAY: u32 = 28;

/// An inclusive date range covering one delivery period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window.
    pub end: NaiveDate,
}

impl DateWindow {
    /// Returns true if the date falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days covered by the window.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Computes the delivery window for a batched rate anchored on `run_date`.
///
/// - `Daily`: the calendar day before the run date.
/// - `Weekly`: the seven days ending the day before the run date.
/// - `Monthly`: the entire previous calendar month. Refused when the run
///   date's day-of-month is 29, 30, or 31.
///
/// # Errors
///
/// Returns `AlertError::InvalidRate` for `RealTime` and `Off`, and
/// `AlertError::InvalidDate` for disallowed monthly anchors.
pub fn window_for(rate: Rate, run_date: NaiveDate) -> Result<DateWindow> {
    match rate {
        Rate::Daily => {
            let day = run_date - Duration::days(1);
            Ok(DateWindow { start: day, end: day })
        }
        Rate::Weekly => Ok(DateWindow {
            start: run_date - Duration::days(7),
            end: run_date - Duration::days(1),
        }),
        Rate::Monthly => {
            if run_date.day() > MONTHLY_LAST_VALID_DAY {
                return Err(AlertError::InvalidDate {
                    reason: "monthly alerts cannot be run on the 29th, 30th or 31st"
                        .to_string(),
                });
            }
            previous_month(run_date)
        }
        Rate::RealTime | Rate::Off => Err(AlertError::InvalidRate {
            rate: rate.as_str().to_string(),
        }),
    }
}

/// The full previous calendar month relative to `run_date`.
fn previous_month(run_date: NaiveDate) -> Result<DateWindow> {
    // Stepping back 28 days from a day <= 28 always lands in the previous
    // month, whatever its length.
    let anchor = run_date - Duration::days(i64::from(MONTHLY_LAST_VALID_DAY));
    let start = first_of_month(anchor.year(), anchor.month())?;
    let next = if anchor.month() == 12 {
        first_of_month(anchor.year() + 1, 1)?
    } else {
        first_of_month(anchor.year(), anchor.month() + 1)?
    };
    Ok(DateWindow {
        start,
        end: next - Duration::days(1),
    })
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| AlertError::InvalidDate {
        reason: format!("no first day for {year}-{month:02}"),
    })
}
