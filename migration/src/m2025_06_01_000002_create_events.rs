//! Migration to create the events table.
//!
//! Events are append-only; every list query orders by `created_at DESC`,
//! and the retention sweep deletes by `(category, created_at)`.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Events::Category).integer().not_null())
                    .col(ColumnDef::new(Events::DetectionNode).string().not_null())
                    .col(ColumnDef::new(Events::SendNode).string().not_null())
                    .col(ColumnDef::new(Events::SendNodeType).string().not_null())
                    .col(ColumnDef::new(Events::ReceiveNode).string().not_null())
                    .col(ColumnDef::new(Events::EventInfo).json_binary().not_null())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Descending index backs both paging and load-more ordering
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at DESC)"
                    .to_string(),
            ))
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_events_category_created_at ON events (category, created_at DESC)"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_events_category_created_at").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_events_created_at").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    Category,
    DetectionNode,
    SendNode,
    SendNodeType,
    ReceiveNode,
    EventInfo,
    CreatedAt,
}
