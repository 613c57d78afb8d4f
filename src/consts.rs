use std::ops::RangeInclusive;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const PROFIT_FUND_PERCENT: &str = "profit_fund_percent";
pub const TICKET_PENALTY_PERCENT: &str = "ticket_penalty_percent";
pub const GROUP_MISS_PERCENT: &str = "group_miss_percent";
pub const GROUP_PARTIAL_PERCENT: &str = "group_partial_percent";

pub const DEFAULT_PROFIT_FUND_PERCENT: Decimal = dec!(5);
pub const DEFAULT_TICKET_PENALTY_PERCENT: Decimal = dec!(5);
pub const DEFAULT_GROUP_MISS_PERCENT: Decimal = dec!(10);
pub const DEFAULT_GROUP_PARTIAL_PERCENT: Decimal = dec!(5);

/// Years a payroll run may target
pub const PAYROLL_YEARS: RangeInclusive<i32> = 2000..=2100;

/// Decimal places kept for money and progress values
pub const MONEY_DP: u32 = 2;

/// Decimal places kept for the per-day weight
pub const PER_DAY_DP: u32 = 4;
