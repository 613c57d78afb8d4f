use chrono::{Datelike as _, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds half away from zero, the way every stored amount is rounded
pub fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// `(month, year)` of the calendar month before `today`
pub fn previous_month(today: NaiveDate) -> (u32, i32) {
    match today.month() {
        1 => (12, today.year() - 1),
        month => (month - 1, today.year()),
    }
}
