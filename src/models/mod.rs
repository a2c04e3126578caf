//! # Data Models
//!
//! This module contains all the data models used throughout the fleet monitor.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod edge;
pub mod event;
pub mod hierarchy;
pub mod obu;
pub mod rsu;

pub use edge::Entity as Edge;
pub use event::Entity as Event;
pub use obu::Entity as Obu;
pub use rsu::Entity as Rsu;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "fleet-monitor".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
