//! Node status table shared by the diagram, the legend and communication actions.

use serde::{Deserialize, Serialize};

/// Visual status of a diagram node. Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeStatus {
    Stop,
    Driving,
    TurnAround,
    Pass,
    VirusExceed,
}

impl NodeStatus {
    pub const ALL: [NodeStatus; 5] = [
        NodeStatus::Stop,
        NodeStatus::Driving,
        NodeStatus::TurnAround,
        NodeStatus::Pass,
        NodeStatus::VirusExceed,
    ];

    pub fn code(self) -> u8 {
        match self {
            NodeStatus::Stop => 0,
            NodeStatus::Driving => 1,
            NodeStatus::TurnAround => 2,
            NodeStatus::Pass => 3,
            NodeStatus::VirusExceed => 4,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            NodeStatus::Stop => "STOP",
            NodeStatus::Driving => "DRIVING",
            NodeStatus::TurnAround => "TURN_AROUND",
            NodeStatus::Pass => "PASS",
            NodeStatus::VirusExceed => "VIRUS_EXCEED",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            NodeStatus::Stop => "gray",
            NodeStatus::Driving => "green",
            NodeStatus::TurnAround => "yellow",
            NodeStatus::Pass => "blue",
            NodeStatus::VirusExceed => "red",
        }
    }

    /// Extra modifier class; only the alert state blinks.
    pub fn modifier(self) -> Option<&'static str> {
        match self {
            NodeStatus::VirusExceed => Some("blink"),
            _ => None,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.key() == key)
    }

    /// Maps free-text communication actions such as `"turn  around"` onto a status.
    ///
    /// Whitespace runs collapse to a single underscore and the result is upper-cased
    /// before the lookup.
    pub fn from_action(action: &str) -> Option<Self> {
        let key = action
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_uppercase();
        Self::from_key(&key)
    }
}

impl TryFrom<u8> for NodeStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == value)
            .ok_or_else(|| format!("unknown node status {value}"))
    }
}

impl From<NodeStatus> for u8 {
    fn from(status: NodeStatus) -> Self {
        status.code()
    }
}
