use chrono::{Datelike as _, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{consts::{PAYROLL_YEARS, PER_DAY_DP}, payroll::PayrollError, utils};

/// First and last day of the month, `None` for a month outside `1..=12`
pub fn month_bounds(month: u32, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = match month {
        12 => NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
        _ => NaiveDate::from_ymd_opt(year, month + 1, 1)?,
    };

    Some((first, next.pred_opt()?))
}

/// Calendar days of a Gregorian month, 0 when the month is invalid
pub fn days_in_month(month: u32, year: i32) -> u32 {
    month_bounds(month, year)
        .map(|(_, last)| last.day())
        .unwrap_or(0)
}

/// Weight of one ordinary working day toward a 100% month
pub fn per_day_percent(month: u32, year: i32) -> Decimal {
    match days_in_month(month, year) {
        0 => Decimal::ZERO,
        days => utils::round(dec!(100) / Decimal::from(days), PER_DAY_DP),
    }
}

pub fn validate_period(month: u32, year: i32) -> Result<(), PayrollError> {
    if !(1..=12).contains(&month) {
        return Err(PayrollError::Validation(format!("invalid month `{month}`, expected 1-12")));
    }

    if !PAYROLL_YEARS.contains(&year) {
        return Err(PayrollError::Validation(format!(
            "invalid year `{year}`, expected {}-{}",
            PAYROLL_YEARS.start(),
            PAYROLL_YEARS.end()
        )));
    }

    Ok(())
}
