use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cooldown::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Cooldown::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Cooldown::EntityId).uuid().not_null())
                    .col(ColumnDef::new(Cooldown::Event).string().not_null())
                    .col(
                        ColumnDef::new(Cooldown::ExpiredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Cooldown::Description).string())
                    .col(
                        ColumnDef::new(Cooldown::CreatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Cooldown::UpdatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cooldown_entity")
                            .from(Cooldown::Table, Cooldown::EntityId)
                            .to(Entity::Table, Entity::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cooldown_unique_event")
                    .table(Cooldown::Table)
                    .col(Cooldown::EntityId)
                    .col(Cooldown::Event)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TRIGGER cooldown_updated_at
            AFTER UPDATE ON cooldown
            FOR EACH ROW
            BEGIN
                UPDATE cooldown
                SET updated_at = (datetime('now','localtime'))
                WHERE id = NEW.id;
            END;",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Cooldown::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Cooldown {
    Table,
    Id,
    EntityId,
    Event,
    ExpiredAt,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Entity {
    Table,
    Id,
}
