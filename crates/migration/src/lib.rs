pub use sea_orm_migration::prelude::*;

mod m20240301_000001_users;
mod m20240301_000002_categories;
mod m20240301_000003_expenses;
mod m20240301_000004_exchange_rates;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_users::Migration),
            Box::new(m20240301_000002_categories::Migration),
            Box::new(m20240301_000003_expenses::Migration),
            Box::new(m20240301_000004_exchange_rates::Migration),
        ]
    }
}
