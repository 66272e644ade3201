pub use sea_orm_migration::prelude::*;

mod m20241128_000000_bootstrap;
mod m20260101_000000_create_outbox_messages;
mod m20260102_000000_create_employees;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241128_000000_bootstrap::Migration),
            Box::new(m20260101_000000_create_outbox_messages::Migration),
            Box::new(m20260102_000000_create_employees::Migration),
        ]
    }
}
