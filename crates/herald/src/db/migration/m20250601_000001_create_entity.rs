use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entity::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Entity::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Entity::BotId).string().not_null())
                    .col(ColumnDef::new(Entity::ParentId).string().not_null())
                    .col(ColumnDef::new(Entity::EntityType).string().not_null())
                    .col(ColumnDef::new(Entity::EntityId).string().not_null())
                    .col(ColumnDef::new(Entity::EntityName).string().not_null())
                    .col(
                        ColumnDef::new(Entity::CreatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Entity::UpdatedAt)
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
                    .name("idx_entity_unique_address")
                    .table(Entity::Table)
                    .col(Entity::BotId)
                    .col(Entity::ParentId)
                    .col(Entity::EntityType)
                    .col(Entity::EntityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TRIGGER entity_updated_at
            AFTER UPDATE ON entity
            FOR EACH ROW
            BEGIN
                UPDATE entity
                SET updated_at = (datetime('now','localtime'))
                WHERE id = NEW.id;
            END;",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Entity::Table).to_owned())
            .await
    }
}

#[allow(clippy::enum_variant_names)]
#[derive(DeriveIden)]
enum Entity {
    Table,
    Id,
    BotId,
    ParentId,
    EntityType,
    EntityId,
    EntityName,
    CreatedAt,
    UpdatedAt,
}
