//! # Event Ingest
//!
//! Accepts new device events. Availability events refresh the reporting
//! device's telemetry before the event row is written, so anyone who observes
//! the event can rely on the device row already being current. Persisted
//! events are then published on the real-time channel.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::DatabaseConnection;
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::error::{ApiError, RepositoryError};
use crate::models::event::{Category, EventData, EventInfo, EventRecord};
use crate::repositories::{DeviceRepository, EventRepository, TelemetryTarget};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("eventInfo does not match category {category:?}: {reason}")]
    InvalidEventInfo { category: Category, reason: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::InvalidEventInfo { category, reason } => ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                "eventInfo does not match the event category",
            )
            .with_details(json!({
                "category": category.id(),
                "eventInfo": reason,
            })),
            IngestError::Repository(err) => err.into(),
        }
    }
}

/// Write side of the event store.
#[derive(Clone)]
pub struct EventIngest {
    db: DatabaseConnection,
    events: broadcast::Sender<EventRecord>,
}

impl EventIngest {
    pub fn new(db: DatabaseConnection, events: broadcast::Sender<EventRecord>) -> Self {
        Self { db, events }
    }

    /// Subscribe to events as they are persisted.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }

    /// Validates, applies telemetry, persists and publishes one event.
    #[instrument(skip_all, fields(category = ?data.category, detection_node = %data.detection_node))]
    pub async fn create(&self, data: EventData) -> Result<EventRecord, IngestError> {
        let info = EventInfo::parse(data.category, &data.event_info).map_err(|err| {
            IngestError::InvalidEventInfo {
                category: data.category,
                reason: err.to_string(),
            }
        })?;

        if let EventInfo::Availability(telemetry) = &info {
            let target = DeviceRepository::new(&self.db)
                .update_telemetry_by_name(&data.detection_node, telemetry)
                .await?;
            if target == TelemetryTarget::NotFound {
                debug!("No RSU or OBU matches the detection node; telemetry not stored");
            }
        }

        let category = data.category;
        let record = EventRepository::new(&self.db)
            .insert(data, Utc::now())
            .await?;

        counter!("events_ingested_total", "category" => category.label()).increment(1);

        if self.events.send(record.clone()).is_err() {
            debug!(event_id = %record.id, "No live subscribers for event");
        }

        Ok(record)
    }

    /// Deletes availability events older than `cutoff` and returns how many were removed.
    pub async fn delete_before_time(&self, cutoff: DateTime<Utc>) -> Result<u64, IngestError> {
        let affected = EventRepository::new(&self.db)
            .delete_before_time(cutoff)
            .await?;

        counter!("events_pruned_total").increment(affected);
        info!(%cutoff, affected, "Pruned availability events");

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::DeviceType;

    #[tokio::test]
    async fn mismatched_event_info_is_rejected_before_touching_the_store() {
        let (tx, _rx) = broadcast::channel(4);
        let ingest = EventIngest::new(DatabaseConnection::default(), tx);

        let err = ingest
            .create(EventData {
                category: Category::Virus,
                detection_node: "RSU1".into(),
                send_node: "RSU1".into(),
                send_node_type: DeviceType::Rsu,
                receive_node: "EDGE1".into(),
                event_info: json!({"cpu": 10}),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::InvalidEventInfo {
                category: Category::Virus,
                ..
            }
        ));

        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
    }
}
