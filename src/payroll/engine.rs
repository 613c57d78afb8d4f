use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    consts::MONEY_DP,
    entity::user,
    payroll::{
        advance::{advance_to_deduct, restore_withheld},
        calendar::{month_bounds, validate_period},
        settings::PayrollSettings,
        store::{AuditEntry, Notice, PayrollStore, PayrollTx, RunLogEntry},
        PayrollError,
    },
    utils,
};

/// `Preview` computes without touching any table, `Run` persists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Preview,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Web,
    Cli,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Web => "web",
            Trigger::Cli => "cli",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub month: u32,
    pub year: i32,
    pub mode: RunMode,
    pub force: bool,
    pub trigger: Trigger,
    pub actor: Option<Uuid>,
}

/// Salary of one staff member before advances are withheld
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalaryFigures {
    pub gross_salary: Decimal,
    pub monthly_progress: Decimal,
    pub profit_fund: Decimal,
    pub payable_before_advance: Decimal,
}

impl SalaryFigures {
    pub fn compute(gross_salary: Decimal, progress_sum: Decimal, profit_fund_percent: Decimal) -> Self {
        let monthly_progress = utils::round(progress_sum.max(Decimal::ZERO), MONEY_DP);
        let profit_fund = utils::round(gross_salary * profit_fund_percent / dec!(100), MONEY_DP);
        let payable_before_advance = utils::round(gross_salary * (monthly_progress / dec!(100)) - profit_fund, MONEY_DP);

        Self {
            gross_salary,
            monthly_progress,
            profit_fund,
            payable_before_advance,
        }
    }

    pub fn net_payable(&self, advances_deducted: Decimal) -> Decimal {
        utils::round(self.payable_before_advance - advances_deducted, MONEY_DP).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryRow {
    pub user_id: Uuid,
    pub username: String,
    pub gross_salary: Decimal,
    pub monthly_progress: Decimal,
    pub profit_fund: Decimal,
    pub payable_before_advance: Decimal,
    pub advances_deducted: Decimal,
    pub net_payable: Decimal,
}

impl SalaryRow {
    fn new(user: &user::Model, figures: SalaryFigures, advances_deducted: Decimal) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            gross_salary: figures.gross_salary,
            monthly_progress: figures.monthly_progress,
            profit_fund: figures.profit_fund,
            payable_before_advance: figures.payable_before_advance,
            advances_deducted,
            net_payable: figures.net_payable(advances_deducted),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserError {
    pub user_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub month: u32,
    pub year: i32,
    pub mode: RunMode,
    pub force: bool,
    pub processed: usize,
    pub total_salary_cost: Decimal,
    pub total_profit_fund_added: Decimal,
    pub errors: Vec<UserError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_rows: Option<Vec<SalaryRow>>,
}

#[derive(Debug, Clone, Copy)]
struct Period {
    month: u32,
    year: i32,
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Default)]
struct Batch {
    rows: Vec<SalaryRow>,
    errors: Vec<UserError>,
}

impl Batch {
    fn total_salary_cost(&self) -> Decimal {
        utils::round(self.rows.iter().map(|r| r.net_payable).sum(), MONEY_DP)
    }

    fn total_profit_fund(&self) -> Decimal {
        utils::round(self.rows.iter().map(|r| r.profit_fund).sum(), MONEY_DP)
    }

    fn into_summary(self, request: &RunRequest) -> RunSummary {
        RunSummary {
            month: request.month,
            year: request.year,
            mode: request.mode,
            force: request.force,
            processed: self.rows.len(),
            total_salary_cost: self.total_salary_cost(),
            total_profit_fund_added: self.total_profit_fund(),
            preview_rows: (request.mode == RunMode::Preview).then(|| self.rows),
            errors: self.errors,
        }
    }
}

pub struct PayrollEngine<S> {
    store: S,
}

impl<S: PayrollStore> PayrollEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn run(&self, request: &RunRequest) -> Result<RunSummary, PayrollError> {
        validate_period(request.month, request.year)?;

        let Some((start, end)) = month_bounds(request.month, request.year) else {
            return Err(PayrollError::Validation(format!("invalid period {}/{}", request.month, request.year)));
        };
        let period = Period { month: request.month, year: request.year, start, end };

        info!(
            month = request.month,
            year = request.year,
            mode = ?request.mode,
            force = request.force,
            trigger = request.trigger.as_str(),
            "Starting payroll"
        );

        let result = match request.mode {
            RunMode::Preview => self.preview(request, period).await,
            RunMode::Run => self.execute(request, period).await,
        };

        match &result {
            Ok(summary) => info!(
                processed = summary.processed,
                errors = summary.errors.len(),
                total_salary_cost = %summary.total_salary_cost,
                "Payroll finished"
            ),
            Err(PayrollError::Persistence(err)) => {
                error!(%err, month = request.month, year = request.year, "Payroll run rolled back");

                if request.mode == RunMode::Run {
                    self.notify_failure(request, err).await;
                }
            },
            Err(err) => warn!(%err, "Payroll rejected"),
        }

        result
    }

    async fn preview(&self, request: &RunRequest, period: Period) -> Result<RunSummary, PayrollError> {
        let tx = self.store.begin().await?;

        let outcome = match tx.settings().await {
            Ok(settings) => process_all(&tx, &settings, request, period).await,
            Err(err) => Err(err),
        };

        tx.rollback().await?;

        Ok(outcome?.into_summary(request))
    }

    async fn execute(&self, request: &RunRequest, period: Period) -> Result<RunSummary, PayrollError> {
        let tx = self.store.begin().await?;

        match execute_in(&tx, request, period).await {
            Ok(summary) => {
                tx.commit().await?;
                Ok(summary)
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(%rollback_err, "Unable to roll back payroll transaction");
                }
                Err(err)
            },
        }
    }

    async fn notify_failure(&self, request: &RunRequest, err: &DbErr) {
        let notice = |user_id| Notice {
            user_id,
            kind: "payroll_failed",
            title: format!("Payroll {:02}/{} failed", request.month, request.year),
            message: format!("The payroll run was rolled back: {err}"),
            link: None,
        };

        if let Err(notify_err) = self.broadcast(notice).await {
            warn!(%notify_err, "Unable to notify admins about the failed payroll");
        }
    }

    async fn broadcast(&self, notice: impl Fn(Uuid) -> Notice) -> Result<(), DbErr> {
        let tx = self.store.begin().await?;

        for admin_id in tx.admin_ids().await? {
            tx.notify(notice(admin_id)).await?;
        }

        tx.commit().await
    }
}

/// Check, optional clear, recompute and log, all inside the caller's transaction
async fn execute_in<T: PayrollTx>(tx: &T, request: &RunRequest, period: Period) -> Result<RunSummary, PayrollError> {
    tx.lock_period(period.month, period.year).await?;

    if tx.run_log_exists(period.month, period.year).await? && !request.force {
        return Err(PayrollError::AlreadyProcessed { month: period.month, year: period.year });
    }

    if request.force {
        discard_period(tx, period).await?;
    }

    let settings = tx.settings().await?;
    let batch = process_all(tx, &settings, request, period).await?;

    let total_salary_cost = batch.total_salary_cost();
    let total_profit_fund = batch.total_profit_fund();
    let processed = batch.rows.len();

    tx.insert_run_log(&RunLogEntry {
        month: period.month,
        year: period.year,
        processed: processed as i32,
        total_salary_cost,
        total_profit_fund,
        trigger: request.trigger,
        run_by: request.actor,
    }).await?;

    tx.audit(AuditEntry {
        actor_id: request.actor,
        action: "payroll.run",
        resource: "payroll_run_log",
        resource_id: None,
        details: json!({
            "month": period.month,
            "year": period.year,
            "force": request.force,
            "processed": processed,
            "errors": batch.errors.len(),
            "total_salary_cost": total_salary_cost,
            "total_profit_fund": total_profit_fund,
        }),
    }).await?;

    for admin_id in tx.admin_ids().await? {
        tx.notify(Notice {
            user_id: admin_id,
            kind: "payroll_processed",
            title: format!("Payroll {:02}/{} processed", period.month, period.year),
            message: format!("{processed} staff processed, total salary cost {total_salary_cost}"),
            link: Some(format!("/payroll/{}/{}", period.year, period.month)),
        }).await?;
    }

    Ok(batch.into_summary(request))
}

/// Drops the period's results and gives back the advances they had withheld
async fn discard_period<T: PayrollTx>(tx: &T, period: Period) -> Result<(), DbErr> {
    let salaries = tx.period_salaries(period.month, period.year).await?;

    for salary in &salaries {
        restore_withheld(tx, salary).await?;
    }

    tx.clear_period(period.month, period.year).await?;

    if !salaries.is_empty() {
        warn!(month = period.month, year = period.year, discarded = salaries.len(), "Discarded previous payroll results");
    }

    Ok(())
}

async fn process_all<T: PayrollTx>(
    tx: &T,
    settings: &PayrollSettings,
    request: &RunRequest,
    period: Period,
) -> Result<Batch, DbErr> {
    let mut batch = Batch::default();

    for user in tx.active_staff().await? {
        let unit = tx.savepoint().await?;

        match process_user(&unit, settings, &user, request, period).await {
            Ok(row) => {
                unit.commit().await?;
                batch.rows.push(row);
            },
            Err(err) => {
                unit.rollback().await?;
                warn!(user_id = %user.id, %err, "Skipping user in payroll");
                batch.errors.push(UserError {
                    user_id: user.id,
                    error: err.to_string(),
                });
            },
        }
    }

    Ok(batch)
}

async fn process_user<T: PayrollTx>(
    tx: &T,
    settings: &PayrollSettings,
    user: &user::Model,
    request: &RunRequest,
    period: Period,
) -> Result<SalaryRow, DbErr> {
    let progress_sum = tx.progress_sum(user.id, period.start, period.end).await?.unwrap_or(Decimal::ZERO);
    let figures = SalaryFigures::compute(user.gross_salary, progress_sum, settings.profit_fund_percent);
    let advances = advance_to_deduct(tx, user.id, period.month, period.year, request.mode).await?;
    let row = SalaryRow::new(user, figures, advances);

    if request.mode == RunMode::Run {
        let salary_id = tx.insert_salary(&row, period.month, period.year).await?;
        tx.upsert_profit_fund(user.id, period.month, period.year, row.profit_fund).await?;
        tx.audit(AuditEntry {
            actor_id: request.actor,
            action: "payroll.salary_created",
            resource: "salary_history",
            resource_id: Some(salary_id),
            details: json!({
                "user_id": user.id,
                "month": period.month,
                "year": period.year,
                "net_payable": row.net_payable,
            }),
        }).await?;
    }

    Ok(row)
}
