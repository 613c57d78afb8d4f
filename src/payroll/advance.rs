use chrono::Local;
use rust_decimal::Decimal;
use sea_orm::DbErr;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    consts::MONEY_DP,
    entity::{advance_auto_deduction, salary_history, sea_orm_active_enums::DeductionStatus},
    payroll::{engine::RunMode, store::PayrollTx},
    utils,
};

/// Ledger movement of one payroll run against an active schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerStep {
    pub to_deduct: Decimal,
    pub remaining_due: Decimal,
    pub status: DeductionStatus,
}

pub fn scheduled_deduction(monthly_deduction: Decimal, remaining_due: Decimal) -> LedgerStep {
    let to_deduct = utils::round(monthly_deduction.min(remaining_due).max(Decimal::ZERO), MONEY_DP);
    let remaining_due = remaining_due - to_deduct;

    if remaining_due <= Decimal::ZERO {
        LedgerStep {
            to_deduct,
            remaining_due: Decimal::ZERO,
            status: DeductionStatus::Completed,
        }
    } else {
        LedgerStep {
            to_deduct,
            remaining_due,
            status: DeductionStatus::Active,
        }
    }
}

/// Approved advances not yet withheld by any other month's salary
pub fn legacy_deduction(approved_total: Decimal, deducted_elsewhere: Decimal) -> Decimal {
    utils::round((approved_total - deducted_elsewhere).max(Decimal::ZERO), MONEY_DP)
}

/// Gives back an amount withheld by a salary that is being discarded
pub fn restore_step(ledger: &advance_auto_deduction::Model, amount: Decimal) -> LedgerStep {
    let remaining_due = (ledger.remaining_due + amount).min(ledger.total_advance);

    LedgerStep {
        to_deduct: Decimal::ZERO,
        remaining_due,
        status: if remaining_due > Decimal::ZERO { DeductionStatus::Active } else { ledger.status },
    }
}

/// Terms of a schedule after an approved advance is added to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTerms {
    pub total_advance: Decimal,
    pub monthly_deduction: Decimal,
    pub remaining_due: Decimal,
}

impl ScheduleTerms {
    pub fn extend(existing: Option<&advance_auto_deduction::Model>, amount: Decimal, monthly_deduction: Decimal) -> Self {
        match existing {
            Some(ledger) => Self {
                total_advance: ledger.total_advance + amount,
                monthly_deduction,
                remaining_due: ledger.remaining_due + amount,
            },
            None => Self {
                total_advance: amount,
                monthly_deduction,
                remaining_due: amount,
            },
        }
    }
}

/// Gives back what a discarded salary withheld, before its month is recomputed
///
/// The amount returns to the schedule it was drawn from. When another
/// schedule is active by now the amount is folded into that one, so a user
/// keeps a single active schedule and the rerun deducts from it. Amounts
/// withheld through the legacy path need no ledger movement unless the user
/// has had a schedule since, which blocks that path.
pub async fn restore_withheld<T: PayrollTx>(tx: &T, salary: &salary_history::Model) -> Result<(), DbErr> {
    let amount = salary.advances_deducted;
    if amount <= Decimal::ZERO {
        return Ok(());
    }

    let source = tx.latest_deduction_before(salary.user_id, salary.created_at).await?;

    let target = match tx.active_deduction(salary.user_id, true).await? {
        Some(active) => Some(active),
        None if source.is_some() => source.clone(),
        None => tx.latest_deduction_before(salary.user_id, Local::now().fixed_offset()).await?,
    };

    let Some(target) = target else {
        return Ok(());
    };

    if source.is_some_and(|source| source.id == target.id) {
        let step = restore_step(&target, amount);
        tx.update_deduction(target.id, step.remaining_due, step.status).await
    } else {
        let terms = ScheduleTerms::extend(Some(&target), amount, target.monthly_deduction);
        tx.extend_deduction(target.id, terms).await
    }
}

/// Amount of approved advances to withhold from `user_id`'s salary this run
///
/// Only [`RunMode::Run`] moves the ledger, previews read it untouched.
pub async fn advance_to_deduct<T: PayrollTx>(
    tx: &T,
    user_id: Uuid,
    month: u32,
    year: i32,
    mode: RunMode,
) -> Result<Decimal, DbErr> {
    let persist = mode == RunMode::Run;

    if let Some(ledger) = tx.active_deduction(user_id, persist).await? {
        let step = scheduled_deduction(ledger.monthly_deduction, ledger.remaining_due);

        if persist {
            tx.update_deduction(ledger.id, step.remaining_due, step.status).await?;
        }

        return Ok(step.to_deduct);
    }

    // A finished schedule owes nothing, the legacy recovery only covers users that never had one
    if tx.has_deduction_schedule(user_id).await? {
        return Ok(Decimal::ZERO);
    }

    let approved = tx.approved_advance_total(user_id).await?;
    let deducted = tx.deducted_in_other_periods(user_id, month, year).await?;

    Ok(legacy_deduction(approved, deducted))
}
