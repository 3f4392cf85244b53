use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SubscriptionSource::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubscriptionSource::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionSource::SubType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SubscriptionSource::SubId).string().not_null())
                    .col(
                        ColumnDef::new(SubscriptionSource::SubUserName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SubscriptionSource::SubInfo).string())
                    .col(
                        ColumnDef::new(SubscriptionSource::CreatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionSource::UpdatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_source_unique_feed")
                    .table(SubscriptionSource::Table)
                    .col(SubscriptionSource::SubType)
                    .col(SubscriptionSource::SubId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TRIGGER subscription_source_updated_at
            AFTER UPDATE ON subscription_source
            FOR EACH ROW
            BEGIN
                UPDATE subscription_source
                SET updated_at = (datetime('now','localtime'))
                WHERE id = NEW.id;
            END;",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SubscriptionSource::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SubscriptionSource {
    Table,
    Id,
    SubType,
    SubId,
    SubUserName,
    SubInfo,
    CreatedAt,
    UpdatedAt,
}
