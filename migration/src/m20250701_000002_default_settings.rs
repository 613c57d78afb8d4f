use sea_orm_migration::prelude::*;

use crate::m20250701_000001_init::Setting;

#[derive(DeriveMigrationName)]
pub struct Migration;

const DEFAULTS: [(&str, &str); 4] = [
    ("profit_fund_percent", "5"),
    ("ticket_penalty_percent", "5"),
    ("group_miss_percent", "10"),
    ("group_partial_percent", "5"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (key, value) in DEFAULTS {
            manager
                .exec_stmt(Query::insert()
                    .into_table(Setting::Table)
                    .columns([Setting::Key, Setting::Value])
                    .values_panic([key.into(), value.into()])
                    .on_conflict(OnConflict::column(Setting::Key)
                        .do_nothing()
                        .to_owned())
                    .to_owned()
            ).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(Query::delete()
                .from_table(Setting::Table)
                .and_where(Expr::col(Setting::Key).is_in(DEFAULTS.map(|(key, _)| key)))
                .to_owned()
        ).await?;

        Ok(())
    }
}
