//! Database migrations for the fleet monitor.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_edge_rsu_obu;
mod m2025_06_01_000002_create_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_edge_rsu_obu::Migration),
            Box::new(m2025_06_01_000002_create_events::Migration),
        ]
    }
}
