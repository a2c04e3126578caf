//! Live Reconciler
//!
//! Applies real-time events to the flattened diagram. The reconciler owns no
//! timers: a transition that needs a follow-up returns a [`Scheduled`] step,
//! which the caller arms and later feeds back through [`LiveReconciler::fire`].
//! Every step carries a generation number so that a step superseded by a
//! newer event for the same node is ignored even if its timer still fires.

use std::collections::HashMap;

use thiserror::Error;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use super::diagram::{
    ConnectionFlow, DiagramNode, EdgeStyle, NodeType, Source, SourceConnection,
};
use super::status::NodeStatus;
use crate::models::event::{Category, DeviceType, EventInfo, EventRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileTimings {
    /// Time a node stays in the alert state.
    pub blink: Duration,
    /// Delay between connection, communication and revert.
    pub connection_change: Duration,
}

/// Transient state of a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePhase {
    Default,
    Alerted {
        since: Instant,
    },
    Connecting {
        since: Instant,
        communication: Box<DiagramNode>,
    },
    Communicating {
        since: Instant,
    },
}

/// Follow-up the caller must deliver back after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub node_id: String,
    pub generation: u64,
    pub delay: Duration,
}

/// Result of delivering a [`Scheduled`] step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The step was superseded; nothing changed.
    Stale,
    /// The node went back to a resting state.
    Settled,
    /// The node advanced and needs another step.
    Continue(Scheduled),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("event {event_id}: device {node_id} is not in the diagram")]
    NodeNotFound { event_id: Uuid, node_id: String },
}

#[derive(Debug, Clone)]
struct NodeState {
    node: DiagramNode,
    /// Snapshot taken when the diagram was loaded.
    default: DiagramNode,
    phase: NodePhase,
    generation: u64,
}

/// Keyed diagram state with a stable render order.
#[derive(Debug)]
pub struct LiveReconciler {
    nodes: HashMap<String, NodeState>,
    order: Vec<String>,
    timings: ReconcileTimings,
    next_generation: u64,
}

impl LiveReconciler {
    pub fn new(nodes: Vec<DiagramNode>, timings: ReconcileTimings) -> Self {
        let mut reconciler = Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            timings,
            next_generation: 0,
        };
        reconciler.load(nodes);
        reconciler
    }

    /// Replaces the diagram. Steps scheduled against the previous diagram become stale.
    pub fn load(&mut self, nodes: Vec<DiagramNode>) {
        self.nodes.clear();
        self.order.clear();
        self.next_generation += 1;

        for node in nodes {
            if self.nodes.contains_key(&node.id) {
                tracing::warn!(node_id = %node.id, "Duplicate diagram node id ignored");
                continue;
            }
            self.order.push(node.id.clone());
            self.nodes.insert(
                node.id.clone(),
                NodeState {
                    default: node.clone(),
                    node,
                    phase: NodePhase::Default,
                    generation: self.next_generation,
                },
            );
        }
    }

    /// Current nodes in render order.
    pub fn snapshot(&self) -> Vec<DiagramNode> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|state| state.node.clone())
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.get(id).map(|state| &state.node)
    }

    pub fn phase(&self, id: &str) -> Option<&NodePhase> {
        self.nodes.get(id).map(|state| &state.phase)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn handle_event(
        &mut self,
        event: &EventRecord,
        now: Instant,
    ) -> Result<Option<Scheduled>, ReconcileError> {
        match event.category {
            Category::Communication => self.communicate(event, now),
            Category::AvailabilityStatusTransfer | Category::Virus => {
                self.alert(event, now).map(Some)
            }
        }
    }

    fn alert(&mut self, event: &EventRecord, now: Instant) -> Result<Scheduled, ReconcileError> {
        let state = self
            .nodes
            .get_mut(&event.send_node)
            .ok_or_else(|| not_found(event, &event.send_node))?;

        if matches!(
            state.phase,
            NodePhase::Connecting { .. } | NodePhase::Communicating { .. }
        ) {
            state.node.restore_edges_from(&state.default);
        }
        state.node.node_status = Some(NodeStatus::VirusExceed);
        state.phase = NodePhase::Alerted { since: now };

        self.next_generation += 1;
        state.generation = self.next_generation;

        Ok(Scheduled {
            node_id: state.node.id.clone(),
            generation: state.generation,
            delay: self.timings.blink,
        })
    }

    fn communicate(
        &mut self,
        event: &EventRecord,
        now: Instant,
    ) -> Result<Option<Scheduled>, ReconcileError> {
        let target_id = if event.send_node_type == DeviceType::Obu {
            &event.send_node
        } else {
            &event.receive_node
        };

        let node_type = self
            .nodes
            .get(target_id)
            .map(|state| state.node.node_type)
            .ok_or_else(|| not_found(event, target_id))?;

        // A new connection must point at a node that exists.
        if node_type == NodeType::CustomNode && !self.nodes.contains_key(&event.send_node) {
            return Err(not_found(event, &event.send_node));
        }

        let Some(state) = self.nodes.get_mut(target_id) else {
            return Err(not_found(event, target_id));
        };

        let (connection, communication) = match node_type {
            NodeType::Root => return Ok(None),
            NodeType::CustomNode => custom_node_phases(&state.node, event),
            NodeType::Output => leaf_phases(&state.node, event),
        };

        state.node = connection;
        state.phase = NodePhase::Connecting {
            since: now,
            communication: Box::new(communication),
        };

        self.next_generation += 1;
        state.generation = self.next_generation;

        Ok(Some(Scheduled {
            node_id: state.node.id.clone(),
            generation: state.generation,
            delay: self.timings.connection_change,
        }))
    }

    /// Delivers a previously scheduled step.
    pub fn fire(&mut self, node_id: &str, generation: u64, now: Instant) -> Transition {
        let Some(state) = self.nodes.get_mut(node_id) else {
            return Transition::Stale;
        };
        if state.generation != generation {
            return Transition::Stale;
        }

        match std::mem::replace(&mut state.phase, NodePhase::Default) {
            NodePhase::Default => Transition::Stale,
            NodePhase::Alerted { .. } => {
                state.node.node_status = None;
                Transition::Settled
            }
            NodePhase::Connecting { communication, .. } => {
                state.node = *communication;
                state.phase = NodePhase::Communicating { since: now };

                self.next_generation += 1;
                state.generation = self.next_generation;

                Transition::Continue(Scheduled {
                    node_id: state.node.id.clone(),
                    generation: state.generation,
                    delay: self.timings.connection_change,
                })
            }
            NodePhase::Communicating { .. } => {
                state.node = state.default.clone();
                Transition::Settled
            }
        }
    }
}

fn not_found(event: &EventRecord, node_id: &str) -> ReconcileError {
    ReconcileError::NodeNotFound {
        event_id: event.id,
        node_id: node_id.to_string(),
    }
}

fn flow_for(node: &DiagramNode, event: &EventRecord) -> ConnectionFlow {
    if node.id == event.send_node {
        ConnectionFlow::Reverse
    } else {
        ConnectionFlow::Normal
    }
}

/// Replaces the entry with the same id, or appends it. Returns true on append.
pub fn upsert_connection(connections: &mut Vec<SourceConnection>, entry: SourceConnection) -> bool {
    match connections.iter_mut().find(|conn| conn.id == entry.id) {
        Some(existing) => {
            *existing = entry;
            false
        }
        None => {
            connections.push(entry);
            true
        }
    }
}

fn custom_node_phases(node: &DiagramNode, event: &EventRecord) -> (DiagramNode, DiagramNode) {
    let mut connections = node
        .source
        .as_ref()
        .map(Source::to_connections)
        .unwrap_or_default();

    let mut entry = SourceConnection {
        id: event.send_node.clone(),
        edge_style: EdgeStyle::highlight(),
        connection_flow: None,
        edge_animated: false,
    };
    upsert_connection(&mut connections, entry.clone());
    let mut connection = node.clone();
    connection.source = Some(Source::Connections(connections.clone()));

    entry.edge_animated = true;
    entry.connection_flow = Some(flow_for(node, event));
    upsert_connection(&mut connections, entry);
    let mut communication = node.clone();
    communication.source = Some(Source::Connections(connections));

    (connection, communication)
}

fn leaf_phases(node: &DiagramNode, event: &EventRecord) -> (DiagramNode, DiagramNode) {
    let mut connection = node.clone();
    connection.edge_style = EdgeStyle::highlight();

    let mut communication = connection.clone();
    communication.edge_animated = true;
    communication.connection_flow = Some(flow_for(node, event));
    if let Some(status) = action_status(event) {
        communication.node_status = Some(status);
    }

    (connection, communication)
}

fn action_status(event: &EventRecord) -> Option<NodeStatus> {
    match event.info()? {
        EventInfo::Communication(info) => NodeStatus::from_action(&info.info),
        _ => None,
    }
}
