use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One serialized snapshot per entity id
        manager
            .create_table(
                Table::create()
                    .table(TimelineCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TimelineCache::Key)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TimelineCache::Payload).text().not_null())
                    .col(
                        ColumnDef::new(TimelineCache::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TimelineCache::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TimelineCache {
    Table,
    Key,
    Payload,
    UpdatedAt,
}
