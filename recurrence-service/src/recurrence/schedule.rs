//! Occurrence date arithmetic.

use crate::models::Cadence;
use chrono::{Datelike, Days, NaiveDate};

/// Payment term applied to every generated invoice.
pub const PAYMENT_TERM_DAYS: u64 = 30;

/// Advance `last_date` by one step of `cadence`, landing on `anchor_day`
/// clamped to the length of the target month.
///
/// Returns `None` only when the result falls outside chrono's date range.
pub fn compute_next_occurrence(
    last_date: NaiveDate,
    cadence: Cadence,
    anchor_day: u32,
) -> Option<NaiveDate> {
    let months = i64::from(last_date.year()) * 12
        + i64::from(last_date.month0())
        + i64::from(cadence.months());
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = months.rem_euclid(12) as u32 + 1;
    let day = anchor_day.clamp(1, days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Number of days in `month` (1-based) of `year`.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next_first.signed_duration_since(first).num_days()).ok()
}

pub fn due_date_for(issue_date: NaiveDate) -> Option<NaiveDate> {
    issue_date.checked_add_days(Days::new(PAYMENT_TERM_DAYS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_anchor_31_clamps_to_thirty_day_month() {
        let next = compute_next_occurrence(date(2024, 3, 31), Cadence::Monthly, 31).unwrap();
        assert_eq!(next, date(2024, 4, 30));
    }

    #[test]
    fn monthly_anchor_31_clamps_to_february() {
        assert_eq!(
            compute_next_occurrence(date(2024, 1, 31), Cadence::Monthly, 31),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            compute_next_occurrence(date(2023, 1, 31), Cadence::Monthly, 31),
            Some(date(2023, 2, 28))
        );
    }

    #[test]
    fn anchor_is_restored_after_a_short_month() {
        let next = compute_next_occurrence(date(2024, 2, 29), Cadence::Monthly, 31).unwrap();
        assert_eq!(next, date(2024, 3, 31));
    }

    #[test]
    fn quarterly_keeps_anchor_day() {
        let next = compute_next_occurrence(date(2024, 1, 15), Cadence::Quarterly, 15).unwrap();
        assert_eq!(next, date(2024, 4, 15));
    }

    #[test]
    fn annual_from_leap_day_lands_on_february_28() {
        let next = compute_next_occurrence(date(2024, 2, 29), Cadence::Annual, 29).unwrap();
        assert_eq!(next, date(2025, 2, 28));
    }

    #[test]
    fn monthly_rolls_over_the_year() {
        let next = compute_next_occurrence(date(2024, 12, 10), Cadence::Monthly, 10).unwrap();
        assert_eq!(next, date(2025, 1, 10));

        let next = compute_next_occurrence(date(2024, 11, 30), Cadence::Quarterly, 30).unwrap();
        assert_eq!(next, date(2025, 2, 28));
    }

    #[test]
    fn anchor_day_uses_target_month_not_source_day() {
        // Issued late on the 20th, anchored on the 5th.
        let next = compute_next_occurrence(date(2024, 6, 20), Cadence::Monthly, 5).unwrap();
        assert_eq!(next, date(2024, 7, 5));
    }

    #[test]
    fn out_of_range_anchor_is_clamped() {
        assert_eq!(
            compute_next_occurrence(date(2024, 1, 10), Cadence::Monthly, 0),
            Some(date(2024, 2, 1))
        );
        assert_eq!(
            compute_next_occurrence(date(2024, 1, 10), Cadence::Monthly, 45),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2100, 2), Some(28));
        assert_eq!(days_in_month(2000, 2), Some(29));
        assert_eq!(days_in_month(2024, 12), Some(31));
        assert_eq!(days_in_month(2024, 13), None);
    }

    #[test]
    fn due_date_is_thirty_days_out() {
        assert_eq!(due_date_for(date(2024, 1, 15)), Some(date(2024, 2, 14)));
    }
}
