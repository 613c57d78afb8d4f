use sea_orm_migration::{prelude::{extension::postgres::TypeDropStatement, *}, sea_orm::{ActiveEnum, DbBackend, DeriveActiveEnum, EnumIter, Schema}};

use crate::{setup_user_fk, util::{default_table_statement, default_user_table_statement, money, percent_override, unique_index, DefaultColumn}};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(DbBackend::Postgres);

        manager.create_type(schema.create_enum_from_active_enum::<RoleType>()).await?;
        manager.create_type(schema.create_enum_from_active_enum::<AdvanceStatus>()).await?;
        manager.create_type(schema.create_enum_from_active_enum::<DeductionStatus>()).await?;
        manager.create_type(schema.create_enum_from_active_enum::<SalaryStatus>()).await?;

        manager
            .create_table(default_table_statement()
                .table(Team::Table)
                .col(ColumnDef::new(Team::Name)
                    .text()
                    .unique_key()
                    .not_null())
                .take()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(User::Table)
                .col(ColumnDef::new(User::Username)
                    .text()
                    .unique_key()
                    .not_null())
                .col(ColumnDef::new(User::Role)
                    .custom(RoleType::name())
                    .not_null())
                .col(money(User::GrossSalary))
                .col(ColumnDef::new(User::TeamId)
                    .uuid()
                    .null())
                .col(ColumnDef::new(User::IsActive)
                    .boolean()
                    .not_null()
                    .default(true))
                .col(ColumnDef::new(User::DeletedAt)
                    .timestamp_with_time_zone()
                    .null())
                .take()
            ).await?;

        manager.create_foreign_key(ForeignKeyCreateStatement::new()
            .from(User::Table, User::TeamId)
            .to(Team::Table, DefaultColumn::Id)
            .on_delete(ForeignKeyAction::SetNull)
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(Customer::Table)
                .col(ColumnDef::new(Customer::Name)
                    .text()
                    .not_null())
                .col(percent_override(Customer::TicketPenaltyPercent))
                .col(percent_override(Customer::GroupMissPenaltyPercent))
                .col(percent_override(Customer::GroupPartialPenaltyPercent))
                .take()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(Setting::Table)
                .col(ColumnDef::new(Setting::Key)
                    .text()
                    .unique_key()
                    .not_null())
                .col(ColumnDef::new(Setting::Value)
                    .text()
                    .null())
                .take()
            ).await?;

        manager
            .create_table(default_user_table_statement()
                .table(MonthlyTicketTotal::Table)
                .col(ColumnDef::new(Period::Month).integer().not_null())
                .col(ColumnDef::new(Period::Year).integer().not_null())
                .col(ColumnDef::new(MonthlyTicketTotal::TotalTickets)
                    .integer()
                    .not_null()
                    .default(0))
                .take()
            ).await?;
        setup_user_fk!(manager, MonthlyTicketTotal::Table);
        manager.create_index(unique_index("uq_monthly_ticket_total_period", MonthlyTicketTotal::Table)
            .col(Period::Month)
            .col(Period::Year)
            .take()
        ).await?;

        manager
            .create_table(default_user_table_statement()
                .table(StaffTicketCount::Table)
                .col(ColumnDef::new(Owned::UserId).uuid().not_null())
                .col(ColumnDef::new(Period::Month).integer().not_null())
                .col(ColumnDef::new(Period::Year).integer().not_null())
                .col(ColumnDef::new(StaffTicketCount::TicketCount)
                    .integer()
                    .not_null()
                    .default(0))
                .take()
            ).await?;
        setup_user_fk!(manager, StaffTicketCount::Table, Owned::UserId);
        manager.create_index(unique_index("uq_staff_ticket_count_user_period", StaffTicketCount::Table)
            .col(Owned::UserId)
            .col(Period::Month)
            .col(Period::Year)
            .take()
        ).await?;

        manager
            .create_table(default_user_table_statement()
                .table(DailyProgress::Table)
                .col(ColumnDef::new(Owned::UserId).uuid().not_null())
                .col(ColumnDef::new(DailyProgress::Date).date().not_null())
                .col(ColumnDef::new(DailyProgress::TicketsMissed)
                    .integer()
                    .not_null()
                    .default(0))
                .col(ColumnDef::new(DailyProgress::GroupsStatus)
                    .json_binary()
                    .not_null()
                    .default(Expr::cust("'[]'::jsonb")))
                .col(ColumnDef::new(DailyProgress::IsMissed)
                    .boolean()
                    .not_null()
                    .default(false))
                .col(ColumnDef::new(DailyProgress::IsOvertime)
                    .boolean()
                    .not_null()
                    .default(false))
                .col(ColumnDef::new(DailyProgress::ProgressPercent)
                    .decimal_len(6, 2)
                    .not_null()
                    .default(0))
                .col(ColumnDef::new(DailyProgress::Notes).text().null())
                .col(ColumnDef::new(DailyProgress::CustomerId).uuid().null())
                .check(Expr::cust("NOT (is_missed AND is_overtime)"))
                .take()
            ).await?;
        setup_user_fk!(manager, DailyProgress::Table, Owned::UserId);
        manager.create_foreign_key(ForeignKeyCreateStatement::new()
            .from(DailyProgress::Table, DailyProgress::CustomerId)
            .to(Customer::Table, DefaultColumn::Id)
            .on_delete(ForeignKeyAction::SetNull)
            .take()
        ).await?;
        manager.create_index(unique_index("uq_daily_progress_user_date", DailyProgress::Table)
            .col(Owned::UserId)
            .col(DailyProgress::Date)
            .take()
        ).await?;

        manager
            .create_table(default_user_table_statement()
                .table(AdvanceRequest::Table)
                .col(ColumnDef::new(Owned::UserId).uuid().not_null())
                .col(money(AdvanceRequest::Amount))
                .col(ColumnDef::new(AdvanceRequest::Reason).text().not_null())
                .col(ColumnDef::new(AdvanceRequest::Status)
                    .custom(AdvanceStatus::name())
                    .not_null())
                .col(ColumnDef::new(AdvanceRequest::ApprovedBy).uuid().null())
                .col(ColumnDef::new(AdvanceRequest::ApprovedAt)
                    .timestamp_with_time_zone()
                    .null())
                .take()
            ).await?;
        setup_user_fk!(manager, AdvanceRequest::Table, Owned::UserId);

        manager
            .create_table(default_table_statement()
                .table(AdvanceAutoDeduction::Table)
                .col(ColumnDef::new(Owned::UserId).uuid().not_null())
                .col(money(AdvanceAutoDeduction::TotalAdvance))
                .col(money(AdvanceAutoDeduction::MonthlyDeduction))
                .col(money(AdvanceAutoDeduction::RemainingDue))
                .col(ColumnDef::new(AdvanceAutoDeduction::Status)
                    .custom(DeductionStatus::name())
                    .not_null())
                .take()
            ).await?;
        manager.create_foreign_key(ForeignKeyCreateStatement::new()
            .from(AdvanceAutoDeduction::Table, Owned::UserId)
            .to(User::Table, DefaultColumn::Id)
            .on_delete(ForeignKeyAction::Cascade)
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(SalaryHistory::Table)
                .col(ColumnDef::new(Owned::UserId).uuid().not_null())
                .col(ColumnDef::new(Period::Month).integer().not_null())
                .col(ColumnDef::new(Period::Year).integer().not_null())
                .col(money(SalaryHistory::GrossSalary))
                .col(money(SalaryHistory::ProfitFund))
                .col(ColumnDef::new(SalaryHistory::MonthlyProgress)
                    .decimal_len(7, 2)
                    .not_null()
                    .default(0))
                .col(money(SalaryHistory::PayableBeforeAdvance))
                .col(money(SalaryHistory::AdvancesDeducted))
                .col(money(SalaryHistory::NetPayable))
                .col(ColumnDef::new(SalaryHistory::Status)
                    .custom(SalaryStatus::name())
                    .not_null())
                .take()
            ).await?;
        manager.create_foreign_key(ForeignKeyCreateStatement::new()
            .from(SalaryHistory::Table, Owned::UserId)
            .to(User::Table, DefaultColumn::Id)
            .on_delete(ForeignKeyAction::Cascade)
            .take()
        ).await?;
        manager.create_index(unique_index("uq_salary_history_user_period", SalaryHistory::Table)
            .col(Owned::UserId)
            .col(Period::Month)
            .col(Period::Year)
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(ProfitFund::Table)
                .col(ColumnDef::new(Owned::UserId).uuid().not_null())
                .col(ColumnDef::new(Period::Month).integer().not_null())
                .col(ColumnDef::new(Period::Year).integer().not_null())
                .col(money(ProfitFund::Amount))
                .take()
            ).await?;
        manager.create_foreign_key(ForeignKeyCreateStatement::new()
            .from(ProfitFund::Table, Owned::UserId)
            .to(User::Table, DefaultColumn::Id)
            .on_delete(ForeignKeyAction::Cascade)
            .take()
        ).await?;
        manager.create_index(unique_index("uq_profit_fund_user_period", ProfitFund::Table)
            .col(Owned::UserId)
            .col(Period::Month)
            .col(Period::Year)
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(PayrollRunLog::Table)
                .col(ColumnDef::new(Period::Month).integer().not_null())
                .col(ColumnDef::new(Period::Year).integer().not_null())
                .col(ColumnDef::new(PayrollRunLog::Processed)
                    .integer()
                    .not_null()
                    .default(0))
                .col(money(PayrollRunLog::TotalSalaryCost))
                .col(money(PayrollRunLog::TotalProfitFund))
                .col(ColumnDef::new(PayrollRunLog::Trigger).text().not_null())
                .col(ColumnDef::new(PayrollRunLog::RunBy).uuid().null())
                .take()
            ).await?;
        manager.create_index(unique_index("uq_payroll_run_log_period", PayrollRunLog::Table)
            .col(Period::Month)
            .col(Period::Year)
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(AuditLog::Table)
                .col(ColumnDef::new(AuditLog::ActorId).uuid().null())
                .col(ColumnDef::new(AuditLog::Action).text().not_null())
                .col(ColumnDef::new(AuditLog::Resource).text().not_null())
                .col(ColumnDef::new(AuditLog::ResourceId).uuid().null())
                .col(ColumnDef::new(AuditLog::Details).json_binary().not_null())
                .take()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(Notification::Table)
                .col(ColumnDef::new(Owned::UserId).uuid().not_null())
                .col(ColumnDef::new(Notification::Kind).text().not_null())
                .col(ColumnDef::new(Notification::Title).text().not_null())
                .col(ColumnDef::new(Notification::Message).text().not_null())
                .col(ColumnDef::new(Notification::Link).text().null())
                .col(ColumnDef::new(Notification::IsRead)
                    .boolean()
                    .not_null()
                    .default(false))
                .take()
            ).await?;
        manager.create_foreign_key(ForeignKeyCreateStatement::new()
            .from(Notification::Table, Owned::UserId)
            .to(User::Table, DefaultColumn::Id)
            .on_delete(ForeignKeyAction::Cascade)
            .take()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let tables = [
            Notification::Table.into_iden(),
            AuditLog::Table.into_iden(),
            PayrollRunLog::Table.into_iden(),
            ProfitFund::Table.into_iden(),
            SalaryHistory::Table.into_iden(),
            AdvanceAutoDeduction::Table.into_iden(),
            AdvanceRequest::Table.into_iden(),
            DailyProgress::Table.into_iden(),
            StaffTicketCount::Table.into_iden(),
            MonthlyTicketTotal::Table.into_iden(),
            Setting::Table.into_iden(),
            Customer::Table.into_iden(),
            User::Table.into_iden(),
            Team::Table.into_iden(),
        ];

        for table in tables {
            manager
                .drop_table(TableDropStatement::new()
                    .table(table)
                    .if_exists()
                    .take()
                ).await?;
        }

        for name in [RoleType::name(), AdvanceStatus::name(), DeductionStatus::name(), SalaryStatus::name()] {
            manager
                .drop_type(TypeDropStatement::new()
                    .name(name)
                    .if_exists()
                    .to_owned()
                ).await?;
        }

        Ok(())
    }
}

/// Columns shared by every per-period table
#[derive(DeriveIden)]
enum Period {
    Month,
    Year,
}

/// Owner column of per-user tables
#[derive(DeriveIden)]
enum Owned {
    UserId,
}

#[derive(DeriveIden)]
pub(crate) enum User {
    Table,
    Username,
    Role,
    GrossSalary,
    TeamId,
    IsActive,
    DeletedAt,
}

#[derive(EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "role_type")]
enum RoleType {
    #[sea_orm(string_value = "staff")]
    Staff,
    #[sea_orm(string_value = "accountant")]
    Accountant,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "superadmin")]
    Superadmin,
}

#[derive(EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "advance_status")]
enum AdvanceStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "deduction_status")]
enum DeductionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
}

#[derive(EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "salary_status")]
enum SalaryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "paid")]
    Paid,
}

#[derive(DeriveIden)]
enum Team {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum Customer {
    Table,
    Name,
    TicketPenaltyPercent,
    GroupMissPenaltyPercent,
    GroupPartialPenaltyPercent,
}

#[derive(DeriveIden)]
pub(crate) enum Setting {
    Table,
    Key,
    Value,
}

#[derive(DeriveIden)]
enum MonthlyTicketTotal {
    Table,
    TotalTickets,
}

#[derive(DeriveIden)]
enum StaffTicketCount {
    Table,
    TicketCount,
}

#[derive(DeriveIden)]
enum DailyProgress {
    Table,
    Date,
    TicketsMissed,
    GroupsStatus,
    IsMissed,
    IsOvertime,
    ProgressPercent,
    Notes,
    CustomerId,
}

#[derive(DeriveIden)]
enum AdvanceRequest {
    Table,
    Amount,
    Reason,
    Status,
    ApprovedBy,
    ApprovedAt,
}

#[derive(DeriveIden)]
enum AdvanceAutoDeduction {
    Table,
    TotalAdvance,
    MonthlyDeduction,
    RemainingDue,
    Status,
}

#[derive(DeriveIden)]
enum SalaryHistory {
    Table,
    GrossSalary,
    ProfitFund,
    MonthlyProgress,
    PayableBeforeAdvance,
    AdvancesDeducted,
    NetPayable,
    Status,
}

#[derive(DeriveIden)]
enum ProfitFund {
    Table,
    Amount,
}

#[derive(DeriveIden)]
enum PayrollRunLog {
    Table,
    Processed,
    TotalSalaryCost,
    TotalProfitFund,
    Trigger,
    RunBy,
}

#[derive(DeriveIden)]
enum AuditLog {
    Table,
    ActorId,
    Action,
    Resource,
    ResourceId,
    Details,
}

#[derive(DeriveIden)]
enum Notification {
    Table,
    Kind,
    Title,
    Message,
    Link,
    IsRead,
}
