use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SeenItem::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SeenItem::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SeenItem::SubType).string().not_null())
                    .col(ColumnDef::new(SeenItem::ItemId).string().not_null())
                    .col(ColumnDef::new(SeenItem::OwnerRef).string().not_null())
                    .col(ColumnDef::new(SeenItem::Content).string().not_null())
                    .col(
                        ColumnDef::new(SeenItem::CreatedAt)
                            .date_time()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Item ids are only unique within one feed kind.
        manager
            .create_index(
                Index::create()
                    .name("idx_seen_item_unique_item")
                    .table(SeenItem::Table)
                    .col(SeenItem::SubType)
                    .col(SeenItem::ItemId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SeenItem::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SeenItem {
    Table,
    Id,
    SubType,
    ItemId,
    OwnerRef,
    Content,
    CreatedAt,
}
