//! Device hierarchy payload
//!
//! Nested edge → RSU → OBU relationship served to the dashboard and
//! flattened there into the diagram node list.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHierarchy {
    pub list_edge: Vec<EdgeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EdgeNode {
    pub id: i32,
    pub name: String,
    pub list_rsu: Vec<RsuNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RsuNode {
    pub id: i32,
    pub name: String,
    pub cpu: f64,
    pub ram: f64,
    pub tx: f64,
    pub rx: f64,
    pub list_obu: Vec<ObuNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ObuNode {
    pub id: i32,
    pub name: String,
    pub cpu: f64,
    pub ram: f64,
    pub tx: f64,
    pub rx: f64,
}
