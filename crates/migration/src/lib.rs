pub use sea_orm_migration::prelude::*;

mod m20260101_000001_transactions;
mod m20260101_000002_initial_balance;
mod m20260101_000003_change_stamp;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_transactions::Migration),
            Box::new(m20260101_000002_initial_balance::Migration),
            Box::new(m20260101_000003_change_stamp::Migration),
        ]
    }
}
