use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subscription::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Subscription::EntityId).uuid().not_null())
                    .col(
                        ColumnDef::new(Subscription::SubscriptionSourceId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Subscription::SubInfo).string())
                    .col(
                        ColumnDef::new(Subscription::CreatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscription::UpdatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_entity")
                            .from(Subscription::Table, Subscription::EntityId)
                            .to(Entity::Table, Entity::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_source")
                            .from(Subscription::Table, Subscription::SubscriptionSourceId)
                            .to(SubscriptionSource::Table, SubscriptionSource::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_unique_pair")
                    .table(Subscription::Table)
                    .col(Subscription::EntityId)
                    .col(Subscription::SubscriptionSourceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TRIGGER subscription_updated_at
            AFTER UPDATE ON subscription
            FOR EACH ROW
            BEGIN
                UPDATE subscription
                SET updated_at = (datetime('now','localtime'))
                WHERE id = NEW.id;
            END;",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscription::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Subscription {
    Table,
    Id,
    EntityId,
    SubscriptionSourceId,
    SubInfo,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Entity {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum SubscriptionSource {
    Table,
    Id,
}
