//! In-memory [`PayrollStore`] for engine tests.
//!
//! A transaction works on a private copy of the state and writes it back to
//! its parent on commit, so rollbacks and savepoints behave like the real
//! database as far as a run can observe.

use std::{collections::HashSet, sync::{Arc, Mutex, MutexGuard}};

use chrono::{DateTime, FixedOffset, Local, NaiveDate};

use super::*;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MemoryState {
    pub settings: PayrollSettings,
    pub users: Vec<user::Model>,
    pub progress: Vec<(Uuid, NaiveDate, Decimal)>,
    pub approved_advances: Vec<(Uuid, Decimal)>,
    pub deductions: Vec<advance_auto_deduction::Model>,
    pub salaries: Vec<salary_history::Model>,
    pub profit_funds: Vec<profit_fund::Model>,
    pub run_logs: Vec<payroll_run_log::Model>,
    pub audits: Vec<(&'static str, Option<Uuid>)>,
    pub notifications: Vec<(Uuid, &'static str)>,
    /// Users whose progress lookup fails
    pub failing_users: HashSet<Uuid>,
    /// Makes the run log insert fail, aborting the whole run
    pub fail_run_log: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut MemoryState)) {
        f(&mut self.state.lock().unwrap())
    }
}

pub(crate) struct MemoryTx {
    parent: Arc<Mutex<MemoryState>>,
    working: Arc<Mutex<MemoryState>>,
}

impl MemoryTx {
    fn open(parent: &Arc<Mutex<MemoryState>>) -> Self {
        let copy = parent.lock().unwrap().clone();

        Self {
            parent: parent.clone(),
            working: Arc::new(Mutex::new(copy)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.working.lock().unwrap()
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

#[async_trait]
impl PayrollStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, DbErr> {
        Ok(MemoryTx::open(&self.state))
    }
}

#[async_trait]
impl PayrollTx for MemoryTx {
    async fn savepoint(&self) -> Result<Self, DbErr> {
        Ok(MemoryTx::open(&self.working))
    }

    async fn commit(self) -> Result<(), DbErr> {
        let state = self.working.lock().unwrap().clone();
        *self.parent.lock().unwrap() = state;
        Ok(())
    }

    async fn rollback(self) -> Result<(), DbErr> {
        Ok(())
    }

    async fn lock_period(&self, _month: u32, _year: i32) -> Result<(), DbErr> {
        Ok(())
    }

    async fn settings(&self) -> Result<PayrollSettings, DbErr> {
        Ok(self.state().settings.clone())
    }

    async fn run_log_exists(&self, month: u32, year: i32) -> Result<bool, DbErr> {
        Ok(self.state().run_logs.iter().any(|log| log.month == month as i32 && log.year == year))
    }

    async fn period_salaries(&self, month: u32, year: i32) -> Result<Vec<salary_history::Model>, DbErr> {
        Ok(self.state().salaries.iter()
            .filter(|s| s.month == month as i32 && s.year == year)
            .cloned()
            .collect())
    }

    async fn clear_period(&self, month: u32, year: i32) -> Result<(), DbErr> {
        let mut state = self.state();
        let in_period = |m: i32, y: i32| m == month as i32 && y == year;

        state.salaries.retain(|s| !in_period(s.month, s.year));
        state.profit_funds.retain(|p| !in_period(p.month, p.year));
        state.run_logs.retain(|l| !in_period(l.month, l.year));

        Ok(())
    }

    async fn active_staff(&self) -> Result<Vec<user::Model>, DbErr> {
        let mut staff = self.state().users.iter()
            .filter(|u| u.role == RoleType::Staff && u.is_active && u.deleted_at.is_none())
            .cloned()
            .collect::<Vec<_>>();
        staff.sort_by_key(|u| u.id);

        Ok(staff)
    }

    async fn admin_ids(&self) -> Result<Vec<Uuid>, DbErr> {
        let mut ids = self.state().users.iter()
            .filter(|u| u.role.is_admin() && u.is_active && u.deleted_at.is_none())
            .map(|u| u.id)
            .collect::<Vec<_>>();
        ids.sort();

        Ok(ids)
    }

    async fn progress_sum(&self, user_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<Option<Decimal>, DbErr> {
        let state = self.state();
        if state.failing_users.contains(&user_id) {
            return Err(DbErr::Custom(format!("progress lookup failed for {user_id}")));
        }

        let values = state.progress.iter()
            .filter(|(id, date, _)| *id == user_id && (start..=end).contains(date))
            .map(|(_, _, percent)| *percent)
            .collect::<Vec<_>>();

        Ok((!values.is_empty()).then(|| values.into_iter().sum()))
    }

    async fn active_deduction(&self, user_id: Uuid, _for_update: bool) -> Result<Option<advance_auto_deduction::Model>, DbErr> {
        Ok(self.state().deductions.iter()
            .filter(|d| d.user_id == user_id && d.status == DeductionStatus::Active)
            .max_by_key(|d| d.created_at)
            .cloned())
    }

    async fn latest_deduction_before(
        &self,
        user_id: Uuid,
        before: DateTime<FixedOffset>,
    ) -> Result<Option<advance_auto_deduction::Model>, DbErr> {
        Ok(self.state().deductions.iter()
            .filter(|d| d.user_id == user_id && d.created_at <= before)
            .max_by_key(|d| d.created_at)
            .cloned())
    }

    async fn has_deduction_schedule(&self, user_id: Uuid) -> Result<bool, DbErr> {
        Ok(self.state().deductions.iter().any(|d| d.user_id == user_id))
    }

    async fn update_deduction(&self, id: Uuid, remaining_due: Decimal, status: DeductionStatus) -> Result<(), DbErr> {
        let mut state = self.state();
        let Some(ledger) = state.deductions.iter_mut().find(|d| d.id == id) else {
            return Err(DbErr::RecordNotFound(format!("advance_auto_deduction {id}")));
        };

        ledger.remaining_due = remaining_due;
        ledger.status = status;
        ledger.updated_at = now();

        Ok(())
    }

    async fn extend_deduction(&self, id: Uuid, terms: ScheduleTerms) -> Result<(), DbErr> {
        let mut state = self.state();
        let Some(ledger) = state.deductions.iter_mut().find(|d| d.id == id) else {
            return Err(DbErr::RecordNotFound(format!("advance_auto_deduction {id}")));
        };

        ledger.total_advance = terms.total_advance;
        ledger.monthly_deduction = terms.monthly_deduction;
        ledger.remaining_due = terms.remaining_due;
        ledger.status = DeductionStatus::Active;
        ledger.updated_at = now();

        Ok(())
    }

    async fn approved_advance_total(&self, user_id: Uuid) -> Result<Decimal, DbErr> {
        Ok(self.state().approved_advances.iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, amount)| *amount)
            .sum())
    }

    async fn deducted_in_other_periods(&self, user_id: Uuid, month: u32, year: i32) -> Result<Decimal, DbErr> {
        Ok(self.state().salaries.iter()
            .filter(|s| s.user_id == user_id && !(s.month == month as i32 && s.year == year))
            .map(|s| s.advances_deducted)
            .sum())
    }

    async fn insert_salary(&self, row: &SalaryRow, month: u32, year: i32) -> Result<Uuid, DbErr> {
        let mut state = self.state();
        if state.salaries.iter().any(|s| s.user_id == row.user_id && s.month == month as i32 && s.year == year) {
            return Err(DbErr::Custom("duplicate key value violates uq_salary_history_user_period".to_owned()));
        }

        let id = Uuid::new_v4();
        state.salaries.push(salary_history::Model {
            id,
            created_at: now(),
            updated_at: now(),
            user_id: row.user_id,
            month: month as i32,
            year,
            gross_salary: row.gross_salary,
            profit_fund: row.profit_fund,
            monthly_progress: row.monthly_progress,
            payable_before_advance: row.payable_before_advance,
            advances_deducted: row.advances_deducted,
            net_payable: row.net_payable,
            status: SalaryStatus::Pending,
        });

        Ok(id)
    }

    async fn upsert_profit_fund(&self, user_id: Uuid, month: u32, year: i32, amount: Decimal) -> Result<(), DbErr> {
        let mut state = self.state();
        let existing = state.profit_funds.iter_mut()
            .find(|p| p.user_id == user_id && p.month == month as i32 && p.year == year);

        match existing {
            Some(record) => {
                record.amount = amount;
                record.updated_at = now();
            },
            None => state.profit_funds.push(profit_fund::Model {
                id: Uuid::new_v4(),
                created_at: now(),
                updated_at: now(),
                user_id,
                month: month as i32,
                year,
                amount,
            }),
        }

        Ok(())
    }

    async fn insert_run_log(&self, entry: &RunLogEntry) -> Result<(), DbErr> {
        let mut state = self.state();
        if state.fail_run_log {
            return Err(DbErr::Custom("connection reset while inserting payroll_run_log".to_owned()));
        }

        state.run_logs.push(payroll_run_log::Model {
            id: Uuid::new_v4(),
            created_at: now(),
            updated_at: now(),
            month: entry.month as i32,
            year: entry.year,
            processed: entry.processed,
            total_salary_cost: entry.total_salary_cost,
            total_profit_fund: entry.total_profit_fund,
            trigger: entry.trigger.as_str().to_owned(),
            run_by: entry.run_by,
        });

        Ok(())
    }

    async fn audit(&self, entry: AuditEntry) -> Result<(), DbErr> {
        self.state().audits.push((entry.action, entry.resource_id));
        Ok(())
    }

    async fn notify(&self, notice: Notice) -> Result<(), DbErr> {
        self.state().notifications.push((notice.user_id, notice.kind));
        Ok(())
    }
}
