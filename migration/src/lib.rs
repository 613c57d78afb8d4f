pub use sea_orm_migration::prelude::*;

mod util;
mod m20250701_000001_init;
mod m20250701_000002_default_settings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250701_000001_init::Migration),
            Box::new(m20250701_000002_default_settings::Migration),
        ]
    }
}
