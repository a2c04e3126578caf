//! Migration to create the device hierarchy tables.
//!
//! One edge owns many RSUs, one RSU owns many OBUs. Device names are unique
//! across each table because real-time events address devices by name.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Edge::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Edge::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Edge::Name).string().not_null().unique_key())
                    .col(
                        ColumnDef::new(Edge::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Edge::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rsu::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rsu::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rsu::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Rsu::EdgeId).integer().not_null())
                    .col(ColumnDef::new(Rsu::Cpu).double().not_null().default(0.0))
                    .col(ColumnDef::new(Rsu::Ram).double().not_null().default(0.0))
                    .col(ColumnDef::new(Rsu::Tx).double().not_null().default(0.0))
                    .col(ColumnDef::new(Rsu::Rx).double().not_null().default(0.0))
                    .col(
                        ColumnDef::new(Rsu::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Rsu::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rsu_edge_id")
                            .from(Rsu::Table, Rsu::EdgeId)
                            .to(Edge::Table, Edge::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Obu::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Obu::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Obu::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Obu::RsuId).integer().not_null())
                    .col(ColumnDef::new(Obu::Cpu).double().not_null().default(0.0))
                    .col(ColumnDef::new(Obu::Ram).double().not_null().default(0.0))
                    .col(ColumnDef::new(Obu::Tx).double().not_null().default(0.0))
                    .col(ColumnDef::new(Obu::Rx).double().not_null().default(0.0))
                    .col(
                        ColumnDef::new(Obu::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Obu::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_obu_rsu_id")
                            .from(Obu::Table, Obu::RsuId)
                            .to(Rsu::Table, Rsu::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_rsu_edge_id")
                    .table(Rsu::Table)
                    .col(Rsu::EdgeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_obu_rsu_id")
                    .table(Obu::Table)
                    .col(Obu::RsuId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Obu::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rsu::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Edge::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Edge {
    Table,
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Rsu {
    Table,
    Id,
    Name,
    EdgeId,
    Cpu,
    Ram,
    Tx,
    Rx,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Obu {
    Table,
    Id,
    Name,
    RsuId,
    Cpu,
    Ram,
    Tx,
    Rx,
    CreatedAt,
    UpdatedAt,
}
