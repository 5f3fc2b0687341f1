//! Schema migrations, applied by [`crate::Store::migrate`] at start-up.

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_survey_tables;
mod m20250301_000002_create_auth_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    // Keep our bookkeeping apart from other SeaORM apps sharing the database.
    fn migration_table_name() -> sea_orm::DynIden {
        Alias::new("transit_survey_migrations").into_iden()
    }

    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_survey_tables::Migration),
            Box::new(m20250301_000002_create_auth_tables::Migration),
        ]
    }
}
