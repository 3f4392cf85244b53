use sea_orm::DatabaseConnection;
pub use sea_orm_migration::prelude::*;

use herald_common::error::Result;

mod m20250601_000001_create_entity;
mod m20250601_000002_create_auth_setting;
mod m20250601_000003_create_cooldown;
mod m20250601_000004_create_subscription_source;
mod m20250601_000005_create_subscription;
mod m20250601_000006_create_seen_item;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_entity::Migration),
            Box::new(m20250601_000002_create_auth_setting::Migration),
            Box::new(m20250601_000003_create_cooldown::Migration),
            Box::new(m20250601_000004_create_subscription_source::Migration),
            Box::new(m20250601_000005_create_subscription::Migration),
            Box::new(m20250601_000006_create_seen_item::Migration),
        ]
    }
}

pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None).await?;
    Ok(())
}
