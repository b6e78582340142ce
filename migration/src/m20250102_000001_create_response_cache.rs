use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ResponseCache::Table)
                    .if_not_exists()
                    .col(string(ResponseCache::Key).primary_key())
                    .col(text(ResponseCache::Payload))
                    .col(big_integer(ResponseCache::ExpiresAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_response_cache_expires_at")
                    .table(ResponseCache::Table)
                    .col(ResponseCache::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ResponseCache::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ResponseCache {
    Table,
    Key,
    Payload,
    ExpiresAt,
}
