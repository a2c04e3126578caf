//! Test utilities for database testing.
//!
//! This module provides utilities for setting up in-memory SQLite databases
//! with migrations applied, plus fixture helpers for devices and events.

use anyhow::Result;
use chrono::{DateTime, Utc};
use fleet_monitor::models::event::{Category, DeviceType, EventData, EventRecord};
use fleet_monitor::models::{edge, obu, rsu};
use fleet_monitor::repositories::EventRepository;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Database, DatabaseConnection, Set};
use serde_json::Value;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

#[allow(dead_code)]
pub async fn insert_edge(db: &DatabaseConnection, name: &str) -> Result<i32> {
    let now = Utc::now().fixed_offset();
    let model = edge::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

#[allow(dead_code)]
pub async fn insert_rsu(db: &DatabaseConnection, edge_id: i32, name: &str) -> Result<i32> {
    let now = Utc::now().fixed_offset();
    let model = rsu::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        edge_id: Set(edge_id),
        cpu: Set(0.0),
        ram: Set(0.0),
        tx: Set(0.0),
        rx: Set(0.0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

#[allow(dead_code)]
pub async fn insert_obu(db: &DatabaseConnection, rsu_id: i32, name: &str) -> Result<i32> {
    let now = Utc::now().fixed_offset();
    let model = obu::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        rsu_id: Set(rsu_id),
        cpu: Set(0.0),
        ram: Set(0.0),
        tx: Set(0.0),
        rx: Set(0.0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

/// EDGE1{RSU1{OBU1, OBU2}, RSU2}, EDGE2{RSU3{OBU3}}
#[allow(dead_code)]
pub async fn seed_hierarchy(db: &DatabaseConnection) -> Result<()> {
    let edge1 = insert_edge(db, "EDGE1").await?;
    let edge2 = insert_edge(db, "EDGE2").await?;
    let rsu1 = insert_rsu(db, edge1, "RSU1").await?;
    insert_rsu(db, edge1, "RSU2").await?;
    let rsu3 = insert_rsu(db, edge2, "RSU3").await?;
    insert_obu(db, rsu1, "OBU1").await?;
    insert_obu(db, rsu1, "OBU2").await?;
    insert_obu(db, rsu3, "OBU3").await?;
    Ok(())
}

#[allow(dead_code)]
pub fn event_data(
    category: Category,
    send_node: &str,
    send_node_type: DeviceType,
    receive_node: &str,
    event_info: Value,
) -> EventData {
    EventData {
        category,
        detection_node: send_node.to_string(),
        send_node: send_node.to_string(),
        send_node_type,
        receive_node: receive_node.to_string(),
        event_info,
    }
}

/// Inserts an event row with an explicit creation time.
#[allow(dead_code)]
pub async fn insert_event_at(
    db: &DatabaseConnection,
    data: EventData,
    created_at: DateTime<Utc>,
) -> Result<EventRecord> {
    Ok(EventRepository::new(db).insert(data, created_at).await?)
}
