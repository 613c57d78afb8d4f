//! Persistence used by a payroll run.
//!
//! Every read and write of a run goes through a [`PayrollTx`], so the whole
//! run (idempotency check, force clear, per-user rows, ledger decrements and
//! run log) commits or rolls back as one unit. Each user is processed in a
//! nested transaction (a savepoint on PostgreSQL) so a failing user only
//! discards their own writes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, OnConflict, SimpleExpr},
    ActiveValue::{Set, Unchanged}, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    entity::{
        advance_auto_deduction, advance_request, audit_log, daily_progress, notification, payroll_run_log, prelude::*,
        profit_fund, salary_history,
        sea_orm_active_enums::{AdvanceStatus, DeductionStatus, RoleType, SalaryStatus},
        user,
    },
    payroll::{advance::ScheduleTerms, engine::{SalaryRow, Trigger}, settings::PayrollSettings},
};

#[cfg(test)]
pub(crate) mod memory;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: &'static str,
    pub resource: &'static str,
    pub resource_id: Option<Uuid>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub user_id: Uuid,
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunLogEntry {
    pub month: u32,
    pub year: i32,
    pub processed: i32,
    pub total_salary_cost: Decimal,
    pub total_profit_fund: Decimal,
    pub trigger: Trigger,
    pub run_by: Option<Uuid>,
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    type Tx: PayrollTx;

    async fn begin(&self) -> Result<Self::Tx, DbErr>;
}

#[async_trait]
pub trait PayrollTx: Send + Sync + Sized {
    /// Nested unit of work, discarded on its own by [`PayrollTx::rollback`]
    async fn savepoint(&self) -> Result<Self, DbErr>;

    async fn commit(self) -> Result<(), DbErr>;

    async fn rollback(self) -> Result<(), DbErr>;

    /// Serializes runs of the same period until this transaction ends
    async fn lock_period(&self, month: u32, year: i32) -> Result<(), DbErr>;

    async fn settings(&self) -> Result<PayrollSettings, DbErr>;

    async fn run_log_exists(&self, month: u32, year: i32) -> Result<bool, DbErr>;

    async fn period_salaries(&self, month: u32, year: i32) -> Result<Vec<salary_history::Model>, DbErr>;

    /// Removes salary, profit fund and run log rows of the period
    async fn clear_period(&self, month: u32, year: i32) -> Result<(), DbErr>;

    /// Active, non-deleted staff ordered by id
    async fn active_staff(&self) -> Result<Vec<user::Model>, DbErr>;

    async fn admin_ids(&self) -> Result<Vec<Uuid>, DbErr>;

    async fn progress_sum(&self, user_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<Option<Decimal>, DbErr>;

    /// Most recent active schedule, row-locked when `for_update`
    async fn active_deduction(&self, user_id: Uuid, for_update: bool) -> Result<Option<advance_auto_deduction::Model>, DbErr>;

    /// Most recent schedule of any status created before `before`
    async fn latest_deduction_before(
        &self,
        user_id: Uuid,
        before: chrono::DateTime<chrono::FixedOffset>,
    ) -> Result<Option<advance_auto_deduction::Model>, DbErr>;

    async fn has_deduction_schedule(&self, user_id: Uuid) -> Result<bool, DbErr>;

    async fn update_deduction(&self, id: Uuid, remaining_due: Decimal, status: DeductionStatus) -> Result<(), DbErr>;

    /// Rewrites a schedule's terms and marks it active
    async fn extend_deduction(&self, id: Uuid, terms: ScheduleTerms) -> Result<(), DbErr>;

    async fn approved_advance_total(&self, user_id: Uuid) -> Result<Decimal, DbErr>;

    /// Advances already withheld by salaries of every other period
    async fn deducted_in_other_periods(&self, user_id: Uuid, month: u32, year: i32) -> Result<Decimal, DbErr>;

    async fn insert_salary(&self, row: &SalaryRow, month: u32, year: i32) -> Result<Uuid, DbErr>;

    async fn upsert_profit_fund(&self, user_id: Uuid, month: u32, year: i32, amount: Decimal) -> Result<(), DbErr>;

    async fn insert_run_log(&self, entry: &RunLogEntry) -> Result<(), DbErr>;

    async fn audit(&self, entry: AuditEntry) -> Result<(), DbErr>;

    async fn notify(&self, notice: Notice) -> Result<(), DbErr>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PayrollStore for SeaOrmStore {
    type Tx = SeaOrmTx;

    async fn begin(&self) -> Result<Self::Tx, DbErr> {
        Ok(SeaOrmTx(self.db.begin().await?))
    }
}

pub struct SeaOrmTx(DatabaseTransaction);

fn sum_of(col: impl sea_orm::sea_query::IntoColumnRef) -> SimpleExpr {
    SimpleExpr::FunctionCall(Func::sum(Expr::col(col)))
}

#[async_trait]
impl PayrollTx for SeaOrmTx {
    async fn savepoint(&self) -> Result<Self, DbErr> {
        Ok(SeaOrmTx(self.0.begin().await?))
    }

    async fn commit(self) -> Result<(), DbErr> {
        self.0.commit().await
    }

    async fn rollback(self) -> Result<(), DbErr> {
        self.0.rollback().await
    }

    async fn lock_period(&self, month: u32, year: i32) -> Result<(), DbErr> {
        let backend = self.0.get_database_backend();
        if backend != DbBackend::Postgres {
            return Ok(());
        }

        let key = i64::from(year) * 100 + i64::from(month);
        self.0
            .execute(Statement::from_sql_and_values(backend, "SELECT pg_advisory_xact_lock($1)", [key.into()]))
            .await?;

        Ok(())
    }

    async fn settings(&self) -> Result<PayrollSettings, DbErr> {
        PayrollSettings::load(&self.0).await
    }

    async fn run_log_exists(&self, month: u32, year: i32) -> Result<bool, DbErr> {
        let count = PayrollRunLog::find()
            .filter(payroll_run_log::Column::Month.eq(month as i32))
            .filter(payroll_run_log::Column::Year.eq(year))
            .count(&self.0).await?;

        Ok(count > 0)
    }

    async fn period_salaries(&self, month: u32, year: i32) -> Result<Vec<salary_history::Model>, DbErr> {
        SalaryHistory::find()
            .filter(salary_history::Column::Month.eq(month as i32))
            .filter(salary_history::Column::Year.eq(year))
            .order_by_asc(salary_history::Column::UserId)
            .all(&self.0).await
    }

    async fn clear_period(&self, month: u32, year: i32) -> Result<(), DbErr> {
        SalaryHistory::delete_many()
            .filter(salary_history::Column::Month.eq(month as i32))
            .filter(salary_history::Column::Year.eq(year))
            .exec(&self.0).await?;

        ProfitFund::delete_many()
            .filter(profit_fund::Column::Month.eq(month as i32))
            .filter(profit_fund::Column::Year.eq(year))
            .exec(&self.0).await?;

        PayrollRunLog::delete_many()
            .filter(payroll_run_log::Column::Month.eq(month as i32))
            .filter(payroll_run_log::Column::Year.eq(year))
            .exec(&self.0).await?;

        Ok(())
    }

    async fn active_staff(&self) -> Result<Vec<user::Model>, DbErr> {
        User::find()
            .filter(user::Column::Role.eq(RoleType::Staff))
            .filter(user::Column::IsActive.eq(true))
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::Id)
            .all(&self.0).await
    }

    async fn admin_ids(&self) -> Result<Vec<Uuid>, DbErr> {
        User::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Role.is_in([RoleType::Admin, RoleType::Superadmin]))
            .filter(user::Column::IsActive.eq(true))
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::Id)
            .into_tuple()
            .all(&self.0).await
    }

    async fn progress_sum(&self, user_id: Uuid, start: NaiveDate, end: NaiveDate) -> Result<Option<Decimal>, DbErr> {
        let total: Option<Option<Decimal>> = DailyProgress::find()
            .select_only()
            .column_as(sum_of(daily_progress::Column::ProgressPercent), "total")
            .filter(daily_progress::Column::UserId.eq(user_id))
            .filter(daily_progress::Column::Date.between(start, end))
            .into_tuple()
            .one(&self.0).await?;

        Ok(total.flatten())
    }

    async fn active_deduction(&self, user_id: Uuid, for_update: bool) -> Result<Option<advance_auto_deduction::Model>, DbErr> {
        let mut query = AdvanceAutoDeduction::find()
            .filter(advance_auto_deduction::Column::UserId.eq(user_id))
            .filter(advance_auto_deduction::Column::Status.eq(DeductionStatus::Active))
            .order_by_desc(advance_auto_deduction::Column::CreatedAt);

        if for_update {
            query = query.lock_exclusive();
        }

        query.one(&self.0).await
    }

    async fn latest_deduction_before(
        &self,
        user_id: Uuid,
        before: chrono::DateTime<chrono::FixedOffset>,
    ) -> Result<Option<advance_auto_deduction::Model>, DbErr> {
        AdvanceAutoDeduction::find()
            .filter(advance_auto_deduction::Column::UserId.eq(user_id))
            .filter(advance_auto_deduction::Column::CreatedAt.lte(before))
            .order_by_desc(advance_auto_deduction::Column::CreatedAt)
            .lock_exclusive()
            .one(&self.0).await
    }

    async fn has_deduction_schedule(&self, user_id: Uuid) -> Result<bool, DbErr> {
        let count = AdvanceAutoDeduction::find()
            .filter(advance_auto_deduction::Column::UserId.eq(user_id))
            .count(&self.0).await?;

        Ok(count > 0)
    }

    async fn update_deduction(&self, id: Uuid, remaining_due: Decimal, status: DeductionStatus) -> Result<(), DbErr> {
        AdvanceAutoDeduction::update(advance_auto_deduction::ActiveModel {
            id: Unchanged(id),
            remaining_due: Set(remaining_due),
            status: Set(status),
            updated_at: Set(Local::now().fixed_offset()),
            ..Default::default()
        }).exec(&self.0).await?;

        Ok(())
    }

    async fn extend_deduction(&self, id: Uuid, terms: ScheduleTerms) -> Result<(), DbErr> {
        AdvanceAutoDeduction::update(advance_auto_deduction::ActiveModel {
            id: Unchanged(id),
            total_advance: Set(terms.total_advance),
            monthly_deduction: Set(terms.monthly_deduction),
            remaining_due: Set(terms.remaining_due),
            status: Set(DeductionStatus::Active),
            updated_at: Set(Local::now().fixed_offset()),
            ..Default::default()
        }).exec(&self.0).await?;

        Ok(())
    }

    async fn approved_advance_total(&self, user_id: Uuid) -> Result<Decimal, DbErr> {
        let total: Option<Option<Decimal>> = AdvanceRequest::find()
            .select_only()
            .column_as(sum_of(advance_request::Column::Amount), "total")
            .filter(advance_request::Column::UserId.eq(user_id))
            .filter(advance_request::Column::Status.eq(AdvanceStatus::Approved))
            .into_tuple()
            .one(&self.0).await?;

        Ok(total.flatten().unwrap_or(Decimal::ZERO))
    }

    async fn deducted_in_other_periods(&self, user_id: Uuid, month: u32, year: i32) -> Result<Decimal, DbErr> {
        let total: Option<Option<Decimal>> = SalaryHistory::find()
            .select_only()
            .column_as(sum_of(salary_history::Column::AdvancesDeducted), "total")
            .filter(salary_history::Column::UserId.eq(user_id))
            .filter(Condition::any()
                .add(salary_history::Column::Month.ne(month as i32))
                .add(salary_history::Column::Year.ne(year)))
            .into_tuple()
            .one(&self.0).await?;

        Ok(total.flatten().unwrap_or(Decimal::ZERO))
    }

    async fn insert_salary(&self, row: &SalaryRow, month: u32, year: i32) -> Result<Uuid, DbErr> {
        let model = SalaryHistory::insert(salary_history::ActiveModel {
            created_at: Set(Local::now().fixed_offset()),
            updated_at: Set(Local::now().fixed_offset()),
            user_id: Set(row.user_id),
            month: Set(month as i32),
            year: Set(year),
            gross_salary: Set(row.gross_salary),
            profit_fund: Set(row.profit_fund),
            monthly_progress: Set(row.monthly_progress),
            payable_before_advance: Set(row.payable_before_advance),
            advances_deducted: Set(row.advances_deducted),
            net_payable: Set(row.net_payable),
            status: Set(SalaryStatus::Pending),
            ..Default::default()
        }).exec_with_returning(&self.0).await?;

        Ok(model.id)
    }

    async fn upsert_profit_fund(&self, user_id: Uuid, month: u32, year: i32, amount: Decimal) -> Result<(), DbErr> {
        ProfitFund::insert(profit_fund::ActiveModel {
            created_at: Set(Local::now().fixed_offset()),
            updated_at: Set(Local::now().fixed_offset()),
            user_id: Set(user_id),
            month: Set(month as i32),
            year: Set(year),
            amount: Set(amount),
            ..Default::default()
        })
        .on_conflict(OnConflict::columns([
                profit_fund::Column::UserId,
                profit_fund::Column::Month,
                profit_fund::Column::Year,
            ])
            .update_columns([profit_fund::Column::Amount, profit_fund::Column::UpdatedAt])
            .to_owned())
        .exec(&self.0).await?;

        Ok(())
    }

    async fn insert_run_log(&self, entry: &RunLogEntry) -> Result<(), DbErr> {
        PayrollRunLog::insert(payroll_run_log::ActiveModel {
            created_at: Set(Local::now().fixed_offset()),
            updated_at: Set(Local::now().fixed_offset()),
            month: Set(entry.month as i32),
            year: Set(entry.year),
            processed: Set(entry.processed),
            total_salary_cost: Set(entry.total_salary_cost),
            total_profit_fund: Set(entry.total_profit_fund),
            trigger: Set(entry.trigger.as_str().to_owned()),
            run_by: Set(entry.run_by),
            ..Default::default()
        }).exec(&self.0).await?;

        Ok(())
    }

    async fn audit(&self, entry: AuditEntry) -> Result<(), DbErr> {
        AuditLog::insert(audit_log::ActiveModel {
            created_at: Set(Local::now().fixed_offset()),
            updated_at: Set(Local::now().fixed_offset()),
            actor_id: Set(entry.actor_id),
            action: Set(entry.action.to_owned()),
            resource: Set(entry.resource.to_owned()),
            resource_id: Set(entry.resource_id),
            details: Set(entry.details),
            ..Default::default()
        }).exec(&self.0).await?;

        Ok(())
    }

    async fn notify(&self, notice: Notice) -> Result<(), DbErr> {
        Notification::insert(notification::ActiveModel {
            created_at: Set(Local::now().fixed_offset()),
            updated_at: Set(Local::now().fixed_offset()),
            user_id: Set(notice.user_id),
            kind: Set(notice.kind.to_owned()),
            title: Set(notice.title),
            message: Set(notice.message),
            link: Set(notice.link),
            is_read: Set(false),
            ..Default::default()
        }).exec(&self.0).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal_macros::dec;
    use sea_orm::{MockDatabase, MockExecResult, Value};

    use super::*;

    fn connect(db: MockDatabase) -> (SeaOrmStore, Arc<DatabaseConnection>) {
        let conn = Arc::new(db.into_connection());
        (SeaOrmStore::new(conn.clone()), conn)
    }

    /// Every statement of the finished transactions, `BEGIN` and `COMMIT` included
    fn statements(store: SeaOrmStore, conn: Arc<DatabaseConnection>) -> Vec<Statement> {
        drop(store);

        Arc::into_inner(conn).unwrap()
            .into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().to_vec())
            .collect()
    }

    fn total(value: Option<Decimal>) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("total", Value::from(value))])
    }

    fn executed() -> MockExecResult {
        MockExecResult { last_insert_id: 0, rows_affected: 1 }
    }

    fn ledger(user_id: Uuid) -> advance_auto_deduction::Model {
        advance_auto_deduction::Model {
            id: Uuid::new_v4(),
            created_at: Local::now().into(),
            updated_at: Local::now().into(),
            user_id,
            total_advance: dec!(1000),
            monthly_deduction: dec!(300),
            remaining_due: dec!(700),
            status: DeductionStatus::Active,
        }
    }

    #[actix_web::test]
    async fn test_period_lock_and_progress_sum() {
        let user_id = Uuid::new_v4();
        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([executed()])
            .append_query_results([[total(Some(dec!(95.00)))], [total(None)]]);
        let (store, conn) = connect(db);

        let tx = store.begin().await.unwrap();
        tx.lock_period(6, 2025).await.unwrap();
        assert_eq!(tx.progress_sum(user_id, start, end).await.unwrap(), Some(dec!(95.00)));

        // A user without entries sums to NULL
        let unit = tx.savepoint().await.unwrap();
        assert_eq!(unit.progress_sum(user_id, start, end).await.unwrap(), None);
        unit.rollback().await.unwrap();
        tx.commit().await.unwrap();

        let log = statements(store, conn);
        assert_eq!(log.len(), 7);
        assert_eq!(log[0].sql, "BEGIN");
        assert_eq!(
            log[1],
            Statement::from_sql_and_values(DbBackend::Postgres, "SELECT pg_advisory_xact_lock($1)", [202506i64.into()])
        );
        assert!(log[2].sql.contains("SUM("));
        assert!(log[2].sql.contains("progress_percent"));
        assert!(log[2].sql.contains(r#""daily_progress"."date" BETWEEN $2 AND $3"#));
        assert_eq!(log[3].sql, "SAVEPOINT savepoint_1");
        assert_eq!(log[5].sql, "ROLLBACK TO SAVEPOINT savepoint_1");
        assert_eq!(log[6].sql, "COMMIT");
    }

    #[actix_web::test]
    async fn test_advance_totals() {
        let user_id = Uuid::new_v4();

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([[total(Some(dec!(2000)))], [total(None)]]);
        let (store, conn) = connect(db);

        let tx = store.begin().await.unwrap();
        assert_eq!(tx.deducted_in_other_periods(user_id, 6, 2025).await.unwrap(), dec!(2000));
        assert_eq!(tx.approved_advance_total(user_id).await.unwrap(), Decimal::ZERO);
        tx.commit().await.unwrap();

        let log = statements(store, conn);

        // Any other month of the same year and the same month of any other year
        assert!(log[1].sql.contains(r#"FROM "salary_history""#));
        assert!(log[1].sql.contains(r#""salary_history"."month" <> $2 OR "salary_history"."year" <> $3"#));
        assert!(log[2].sql.contains(r#"FROM "advance_request""#));
        assert!(log[2].sql.contains(r#""advance_request"."status""#));
    }

    #[actix_web::test]
    async fn test_clear_period() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([executed(), executed(), executed()]);
        let (store, conn) = connect(db);

        let tx = store.begin().await.unwrap();
        tx.clear_period(6, 2025).await.unwrap();
        tx.commit().await.unwrap();

        let log = statements(store, conn);
        let deletes = log[1..4].iter().map(|stmt| stmt.sql.as_str()).collect::<Vec<_>>();

        for (sql, table) in deletes.iter().zip(["salary_history", "profit_fund", "payroll_run_log"]) {
            assert!(sql.starts_with(&format!(r#"DELETE FROM "{table}""#)));
            assert!(sql.contains(&format!(r#""{table}"."month" = $1"#)));
            assert!(sql.contains(&format!(r#""{table}"."year" = $2"#)));
        }
    }

    #[actix_web::test]
    async fn test_deduction_lookups() {
        let user_id = Uuid::new_v4();
        let active = ledger(user_id);

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([[active.clone()], [active.clone()], [active.clone()]])
            .append_query_results([[BTreeMap::from([("num_items", Value::from(1i64))])]]);
        let (store, conn) = connect(db);

        let tx = store.begin().await.unwrap();
        assert_eq!(tx.active_deduction(user_id, true).await.unwrap(), Some(active.clone()));
        assert_eq!(tx.active_deduction(user_id, false).await.unwrap(), Some(active.clone()));
        assert_eq!(tx.latest_deduction_before(user_id, Local::now().fixed_offset()).await.unwrap(), Some(active));
        assert!(tx.has_deduction_schedule(user_id).await.unwrap());
        tx.commit().await.unwrap();

        let log = statements(store, conn);
        assert!(log[1].sql.ends_with("FOR UPDATE"));
        assert!(log[1].sql.contains(r#"ORDER BY "advance_auto_deduction"."created_at" DESC"#));
        assert!(!log[2].sql.contains("FOR UPDATE"));
        assert!(log[3].sql.contains(r#""advance_auto_deduction"."created_at" <= $2"#));
        assert!(log[3].sql.ends_with("FOR UPDATE"));
        assert!(log[4].sql.contains("COUNT(*)"));
    }

    #[actix_web::test]
    async fn test_ledger_writes() {
        let user_id = Uuid::new_v4();
        let active = ledger(user_id);

        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([[active.clone()], [active.clone()]])
            .append_query_results([[BTreeMap::from([("id", Value::from(Uuid::new_v4()))])]]);
        let (store, conn) = connect(db);

        let tx = store.begin().await.unwrap();
        tx.update_deduction(active.id, dec!(400), DeductionStatus::Active).await.unwrap();
        tx.extend_deduction(active.id, ScheduleTerms {
            total_advance: dec!(1300),
            monthly_deduction: dec!(300),
            remaining_due: dec!(700),
        }).await.unwrap();
        tx.upsert_profit_fund(user_id, 6, 2025, dec!(2500)).await.unwrap();
        tx.commit().await.unwrap();

        let log = statements(store, conn);

        assert!(log[1].sql.starts_with(r#"UPDATE "advance_auto_deduction" SET"#));
        assert!(log[1].sql.contains(r#""remaining_due" = $"#));
        assert!(!log[1].sql.contains(r#""total_advance" = $"#));

        assert!(log[2].sql.contains(r#""total_advance" = $"#));
        assert!(log[2].sql.contains(r#""status" = "#));

        assert!(log[3].sql.starts_with(r#"INSERT INTO "profit_fund""#));
        assert!(log[3].sql.contains(
            r#"ON CONFLICT ("user_id", "month", "year") DO UPDATE SET "amount" = "excluded"."amount", "updated_at" = "excluded"."updated_at""#
        ));
    }
}
