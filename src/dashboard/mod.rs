//! # Dashboard
//!
//! Client-side logic of the monitoring dashboard: the device diagram and its
//! live reconciliation against real-time events, and the event list views
//! with their filter form, cursor handling and query client.

use std::time::Duration;

use crate::config::DashboardConfig;

pub mod client;
pub mod debounce;
pub mod diagram;
pub mod export;
pub mod filter;
pub mod list;
pub mod notification;
pub mod reconciler;
pub mod session;
pub mod status;
pub mod timers;

pub use client::{ClientError, EventQueryClient, HttpEventClient};
pub use diagram::{DiagramGraph, DiagramNode, flatten};
pub use export::{ExportRow, event_summary, export_rows};
pub use filter::{ListEventForm, ListEventRequest, ListMode, build_request, is_socket_event_valid};
pub use list::{ListController, ListHandle, ListState};
pub use notification::{ChannelNotifier, Notification, NotificationCode, Notifier};
pub use reconciler::{LiveReconciler, ReconcileTimings};
pub use session::{DashboardSession, SessionHandle};
pub use status::NodeStatus;

/// Timing knobs shared by the session and the list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardTimings {
    pub blink: Duration,
    pub connection_change: Duration,
    pub diagram_debounce: Duration,
    pub filter_debounce: Duration,
}

impl DashboardTimings {
    pub fn reconcile(&self) -> ReconcileTimings {
        ReconcileTimings {
            blink: self.blink,
            connection_change: self.connection_change,
        }
    }
}

impl From<&DashboardConfig> for DashboardTimings {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            blink: Duration::from_millis(config.blink_timeout_ms),
            connection_change: Duration::from_millis(config.connection_change_timeout_ms),
            diagram_debounce: Duration::from_millis(config.diagram_debounce_ms),
            filter_debounce: Duration::from_millis(config.filter_debounce_ms),
        }
    }
}

impl Default for DashboardTimings {
    fn default() -> Self {
        Self::from(&DashboardConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use serde_json::Value;
    use uuid::Uuid;

    use crate::models::event::{Category, DeviceType, EventRecord};
    use crate::models::hierarchy::{DeviceHierarchy, EdgeNode, ObuNode, RsuNode};

    fn obu(id: i32, name: &str) -> ObuNode {
        ObuNode {
            id,
            name: name.to_string(),
            cpu: 0.0,
            ram: 0.0,
            tx: 0.0,
            rx: 0.0,
        }
    }

    fn rsu(id: i32, name: &str, list_obu: Vec<ObuNode>) -> RsuNode {
        RsuNode {
            id,
            name: name.to_string(),
            cpu: 0.0,
            ram: 0.0,
            tx: 0.0,
            rx: 0.0,
            list_obu,
        }
    }

    /// EDGE1{RSU1{OBU1, OBU2}, RSU2{}}, EDGE2{RSU3{OBU3}}
    pub fn sample_hierarchy() -> DeviceHierarchy {
        DeviceHierarchy {
            list_edge: vec![
                EdgeNode {
                    id: 1,
                    name: "EDGE1".to_string(),
                    list_rsu: vec![
                        rsu(1, "RSU1", vec![obu(1, "OBU1"), obu(2, "OBU2")]),
                        rsu(2, "RSU2", vec![]),
                    ],
                },
                EdgeNode {
                    id: 2,
                    name: "EDGE2".to_string(),
                    list_rsu: vec![rsu(3, "RSU3", vec![obu(3, "OBU3")])],
                },
            ],
        }
    }

    pub fn event(
        category: Category,
        send_node: &str,
        send_node_type: DeviceType,
        receive_node: &str,
        event_info: Value,
    ) -> EventRecord {
        EventRecord {
            id: Uuid::new_v4(),
            category,
            detection_node: send_node.to_string(),
            send_node: send_node.to_string(),
            send_node_type,
            receive_node: receive_node.to_string(),
            event_info,
            created_at: Utc::now(),
        }
    }
}
