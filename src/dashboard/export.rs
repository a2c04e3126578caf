//! Tabular rendering of a fetched event page.
//!
//! Rows carry display-ready strings under their column headers; writing them
//! to a spreadsheet or CSV file is left to the caller.

use serde::Serialize;

use crate::models::event::EventRecord;

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "No.")]
    pub index: usize,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Detection node")]
    pub detection_node: String,
    #[serde(rename = "Send node")]
    pub send_node: String,
    #[serde(rename = "Send node type")]
    pub send_node_type: String,
    #[serde(rename = "Receive node")]
    pub receive_node: String,
    #[serde(rename = "Event info")]
    pub event_info: String,
    #[serde(rename = "Created at")]
    pub created_at: String,
}

impl ExportRow {
    pub fn from_event(index: usize, event: &EventRecord) -> Self {
        Self {
            index,
            category: event.category.label().to_string(),
            detection_node: event.detection_node.clone(),
            send_node: event.send_node.clone(),
            send_node_type: event.send_node_type.as_str().to_string(),
            receive_node: event.receive_node.clone(),
            event_info: event.info_text(),
            created_at: event.created_at.format(CREATED_AT_FORMAT).to_string(),
        }
    }

    fn columns(&self) -> [(&'static str, &str); 7] {
        [
            ("Category", self.category.as_str()),
            ("Detection node", self.detection_node.as_str()),
            ("Send node", self.send_node.as_str()),
            ("Send node type", self.send_node_type.as_str()),
            ("Receive node", self.receive_node.as_str()),
            ("Event info", self.event_info.as_str()),
            ("Created at", self.created_at.as_str()),
        ]
    }
}

/// Numbers the rows from 1, keeping at most `limit` events.
pub fn export_rows(events: &[EventRecord], limit: usize) -> Vec<ExportRow> {
    events
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, event)| ExportRow::from_event(i + 1, event))
        .collect()
}

/// One-line `Label: value` summary used when copying an event; empty columns are skipped.
pub fn event_summary(event: &EventRecord) -> String {
    ExportRow::from_event(0, event)
        .columns()
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
