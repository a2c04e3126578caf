//! Event entity model
//!
//! This module contains the SeaORM entity model for the events table, the
//! category and device-type enums it stores, and the typed views over the
//! per-category `event_info` payload.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Event category. Serialized on the wire as its numeric id (1, 2, 3).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, DeriveActiveEnum,
    Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(try_from = "u8", into = "u8")]
pub enum Category {
    /// Periodic telemetry heartbeat carrying CPU/RAM/NIC counters
    #[sea_orm(num_value = 1)]
    AvailabilityStatusTransfer,
    /// Virus detection on a device
    #[sea_orm(num_value = 2)]
    Virus,
    /// Communication between two devices
    #[sea_orm(num_value = 3)]
    Communication,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::AvailabilityStatusTransfer,
        Category::Virus,
        Category::Communication,
    ];

    /// Numeric id used by the wire format and the filter form checkboxes.
    pub fn id(self) -> u8 {
        match self {
            Category::AvailabilityStatusTransfer => 1,
            Category::Virus => 2,
            Category::Communication => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::AvailabilityStatusTransfer => "availability_status_transfer",
            Category::Virus => "virus",
            Category::Communication => "communication",
        }
    }
}

impl TryFrom<u8> for Category {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Category::AvailabilityStatusTransfer),
            2 => Ok(Category::Virus),
            3 => Ok(Category::Communication),
            other => Err(format!("unknown event category {other}")),
        }
    }
}

impl From<Category> for u8 {
    fn from(category: Category) -> Self {
        category.id()
    }
}

/// Tier of the device that sent an event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    #[sea_orm(string_value = "EDGE")]
    Edge,
    #[sea_orm(string_value = "RSU")]
    Rsu,
    #[sea_orm(string_value = "OBU")]
    Obu,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Edge => "EDGE",
            DeviceType::Rsu => "RSU",
            DeviceType::Obu => "OBU",
        }
    }
}

/// Event entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub category: Category,

    /// Device that detected the event
    pub detection_node: String,

    pub send_node: String,

    pub send_node_type: DeviceType,

    pub receive_node: String,

    /// Category-specific payload, see [`EventInfo`]
    #[sea_orm(column_type = "JsonBinary")]
    pub event_info: JsonValue,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Network counters reported by availability events
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NicInfo {
    pub tx: f64,
    pub rx: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityInfo {
    pub cpu: f64,
    pub ram: f64,
    pub nic: NicInfo,
}

impl AvailabilityInfo {
    /// Outgoing traffic as a rounded percentage of incoming traffic.
    pub fn traffic_percent(&self) -> i64 {
        if self.nic.rx == 0.0 {
            return 0;
        }
        (self.nic.tx / self.nic.rx * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirusInfo {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommunicationInfo {
    /// Free-text action, e.g. `"turn around"`
    pub info: String,
}

/// Typed view of an event's payload; the variant is selected by category.
#[derive(Debug, Clone, PartialEq)]
pub enum EventInfo {
    Availability(AvailabilityInfo),
    Virus(VirusInfo),
    Communication(CommunicationInfo),
}

impl EventInfo {
    /// Parse a raw payload according to the shape required by `category`.
    pub fn parse(category: Category, value: &JsonValue) -> Result<Self, serde_json::Error> {
        match category {
            Category::AvailabilityStatusTransfer => {
                serde_json::from_value(value.clone()).map(EventInfo::Availability)
            }
            Category::Virus => serde_json::from_value(value.clone()).map(EventInfo::Virus),
            Category::Communication => {
                serde_json::from_value(value.clone()).map(EventInfo::Communication)
            }
        }
    }
}

/// Event as exposed by the API and the real-time channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: Uuid,
    #[schema(value_type = u8, example = 1)]
    pub category: Category,
    #[schema(example = "RSU1")]
    pub detection_node: String,
    #[schema(example = "RSU1")]
    pub send_node: String,
    pub send_node_type: DeviceType,
    #[schema(example = "EDGE1")]
    pub receive_node: String,
    #[schema(value_type = Object)]
    pub event_info: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn info(&self) -> Option<EventInfo> {
        EventInfo::parse(self.category, &self.event_info).ok()
    }

    /// Plain-text rendering of the payload used in notifications and exports.
    pub fn info_text(&self) -> String {
        EventInfoText(self).to_string()
    }
}

struct EventInfoText<'a>(&'a EventRecord);

impl fmt::Display for EventInfoText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.info() {
            Some(EventInfo::Availability(info)) => write!(
                f,
                "CPU {}%, Memory {}%, Traffic volume {}%",
                info.cpu,
                info.ram,
                info.traffic_percent()
            ),
            Some(EventInfo::Virus(info)) => {
                write!(f, "Virus detected in file {}", info.file_name)
            }
            Some(EventInfo::Communication(info)) => write!(
                f,
                "Communication detected by {}: {}",
                self.0.detection_node, info.info
            ),
            None => Ok(()),
        }
    }
}

impl From<Model> for EventRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            category: model.category,
            detection_node: model.detection_node,
            send_node: model.send_node,
            send_node_type: model.send_node_type,
            receive_node: model.receive_node,
            event_info: model.event_info,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Body accepted by the event creation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    #[schema(value_type = u8, example = 1)]
    pub category: Category,
    pub detection_node: String,
    pub send_node: String,
    pub send_node_type: DeviceType,
    pub receive_node: String,
    #[schema(value_type = Object)]
    pub event_info: JsonValue,
}
