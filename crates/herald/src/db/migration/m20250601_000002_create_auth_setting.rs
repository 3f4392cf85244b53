use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthSetting::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthSetting::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthSetting::EntityId).uuid().not_null())
                    .col(ColumnDef::new(AuthSetting::Module).string().not_null())
                    .col(ColumnDef::new(AuthSetting::Plugin).string().not_null())
                    .col(ColumnDef::new(AuthSetting::Node).string().not_null())
                    .col(
                        ColumnDef::new(AuthSetting::Available)
                            .integer()
                            .default(0)
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuthSetting::Value).string())
                    .col(
                        ColumnDef::new(AuthSetting::CreatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthSetting::UpdatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_auth_setting_entity")
                            .from(AuthSetting::Table, AuthSetting::EntityId)
                            .to(Entity::Table, Entity::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_auth_setting_unique_node")
                    .table(AuthSetting::Table)
                    .col(AuthSetting::EntityId)
                    .col(AuthSetting::Module)
                    .col(AuthSetting::Plugin)
                    .col(AuthSetting::Node)
                    .unique()
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TRIGGER auth_setting_updated_at
            AFTER UPDATE ON auth_setting
            FOR EACH ROW
            BEGIN
                UPDATE auth_setting
                SET updated_at = (datetime('now','localtime'))
                WHERE id = NEW.id;
            END;",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuthSetting::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuthSetting {
    Table,
    Id,
    EntityId,
    Module,
    Plugin,
    Node,
    Available,
    Value,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Entity {
    Table,
    Id,
}
