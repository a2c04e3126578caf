//! Diagram Builder
//!
//! Flattens the edge → RSU → OBU hierarchy into the ordered node list the
//! dashboard renders, and projects that list onto layout nodes and edges.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::NodeStatus;
use crate::models::hierarchy::DeviceHierarchy;

pub const ROOT_ID: &str = "center";
pub const ROOT_LABEL: &str = "Center";

/// Stroke used for highlighted connections.
pub const HIGHLIGHT_STROKE: &str = "var(--theme-red-dark)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    #[serde(rename = "input")]
    Root,
    /// Multi-source node (edges and RSUs)
    CustomNode,
    /// Leaf node (OBUs)
    Output,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
}

impl EdgeStyle {
    pub fn highlight() -> Self {
        Self {
            stroke: Some(HIGHLIGHT_STROKE.to_string()),
        }
    }
}

/// Direction the edge animation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionFlow {
    Normal,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConnection {
    pub id: String,
    #[serde(default)]
    pub edge_style: EdgeStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_flow: Option<ConnectionFlow>,
    #[serde(default)]
    pub edge_animated: bool,
}

impl SourceConnection {
    /// Unstyled connection from `id`.
    pub fn plain(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            edge_style: EdgeStyle::default(),
            connection_flow: None,
            edge_animated: false,
        }
    }
}

/// Where a node's incoming edges come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    Parent(String),
    Connections(Vec<SourceConnection>),
}

impl Source {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Source::Parent(id) => vec![id.as_str()],
            Source::Connections(connections) => {
                connections.iter().map(|conn| conn.id.as_str()).collect()
            }
        }
    }

    /// Connection list view; a bare parent becomes a single unstyled entry.
    pub fn to_connections(&self) -> Vec<SourceConnection> {
        match self {
            Source::Parent(id) => vec![SourceConnection::plain(id.clone())],
            Source::Connections(connections) => connections.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_status: Option<NodeStatus>,
    #[serde(default)]
    pub edge_style: EdgeStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_flow: Option<ConnectionFlow>,
    #[serde(default)]
    pub edge_animated: bool,
}

impl DiagramNode {
    fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        node_type: NodeType,
        source: Option<Source>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            source,
            node_status: None,
            edge_style: EdgeStyle::default(),
            connection_flow: None,
            edge_animated: false,
        }
    }

    pub fn root() -> Self {
        Self::new(ROOT_ID, ROOT_LABEL, NodeType::Root, None)
    }

    /// Resets the edge presentation fields to those of `default`.
    pub fn restore_edges_from(&mut self, default: &DiagramNode) {
        self.source = default.source.clone();
        self.edge_style = default.edge_style.clone();
        self.connection_flow = default.connection_flow;
        self.edge_animated = default.edge_animated;
    }
}

fn device_label(name: &str, id: i32) -> String {
    format!("{name} (ID: {id})")
}

/// Flattens the hierarchy into root, then edge-major / RSU-minor / OBU-minor order.
///
/// Node ids are device names, which must be unique across the hierarchy.
pub fn flatten(hierarchy: &DeviceHierarchy) -> Vec<DiagramNode> {
    let mut nodes = vec![DiagramNode::root()];

    for edge in &hierarchy.list_edge {
        nodes.push(DiagramNode::new(
            &edge.name,
            device_label(&edge.name, edge.id),
            NodeType::CustomNode,
            Some(Source::Parent(ROOT_ID.to_string())),
        ));

        for rsu in &edge.list_rsu {
            nodes.push(DiagramNode::new(
                &rsu.name,
                device_label(&rsu.name, rsu.id),
                NodeType::CustomNode,
                Some(Source::Parent(edge.name.clone())),
            ));

            for obu in &rsu.list_obu {
                let mut node = DiagramNode::new(
                    &obu.name,
                    device_label(&obu.name, obu.id),
                    NodeType::Output,
                    Some(Source::Parent(rsu.name.clone())),
                );
                node.node_status = Some(NodeStatus::Driving);
                nodes.push(node);
            }
        }
    }

    nodes
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiagramError {
    #[error("diagram must start with the root node")]
    MissingRoot,
    #[error("root node must not have a source")]
    RootWithSource,
    #[error("duplicate node id {0}")]
    DuplicateId(String),
    #[error("node {node} has no source")]
    MissingSource { node: String },
    #[error("node {node} references unknown source {source_id}")]
    UnresolvedSource { node: String, source_id: String },
    #[error("node {node} is not a customNode but has {count} sources")]
    MultipleSources { node: String, count: usize },
}

/// Checks the structural invariants of a flattened node list.
pub fn validate(nodes: &[DiagramNode]) -> Result<(), DiagramError> {
    let Some(first) = nodes.first() else {
        return Err(DiagramError::MissingRoot);
    };
    if first.node_type != NodeType::Root {
        return Err(DiagramError::MissingRoot);
    }
    if first.source.is_some() {
        return Err(DiagramError::RootWithSource);
    }

    let mut ids = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(DiagramError::DuplicateId(node.id.clone()));
        }
    }

    for node in &nodes[1..] {
        let source = node.source.as_ref().ok_or_else(|| DiagramError::MissingSource {
            node: node.id.clone(),
        })?;
        let source_ids = source.ids();

        if source_ids.len() > 1 && node.node_type != NodeType::CustomNode {
            return Err(DiagramError::MultipleSources {
                node: node.id.clone(),
                count: source_ids.len(),
            });
        }

        if let Some(missing) = source_ids.iter().find(|id| !ids.contains(*id)) {
            return Err(DiagramError::UnresolvedSource {
                node: node.id.clone(),
                source_id: missing.to_string(),
            });
        }
    }

    Ok(())
}

/// Node as handed to the layout engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    pub animated: bool,
    pub style: EdgeStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_direction: Option<ConnectionFlow>,
}

impl LayoutEdge {
    /// Skeleton edges are the tree edges; extra connections carry handles.
    pub fn is_skeleton(&self) -> bool {
        self.source_handle.is_none() && self.target_handle.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagramGraph {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl DiagramGraph {
    pub fn project(nodes: &[DiagramNode]) -> Self {
        let mut graph = DiagramGraph::default();

        for node in nodes {
            graph.nodes.push(LayoutNode {
                id: node.id.clone(),
                label: node.label.clone(),
                node_type: node.node_type,
                class_name: class_name(node.node_status),
            });

            match &node.source {
                None => {}
                Some(Source::Parent(parent)) => graph.edges.push(LayoutEdge {
                    id: format!("e{}-{}", parent, node.id),
                    source: parent.clone(),
                    target: node.id.clone(),
                    source_handle: None,
                    target_handle: None,
                    animated: node.edge_animated,
                    style: node.edge_style.clone(),
                    animation_direction: node.connection_flow,
                }),
                Some(Source::Connections(connections)) => {
                    for (index, conn) in connections.iter().enumerate() {
                        let (source_handle, target_handle) = if index > 0 {
                            (Some(format!("hs-{}", conn.id)), Some(format!("ht-{}", node.id)))
                        } else {
                            (None, None)
                        };
                        graph.edges.push(LayoutEdge {
                            id: format!("e{}-{}-{}", conn.id, node.id, index),
                            source: conn.id.clone(),
                            target: node.id.clone(),
                            source_handle,
                            target_handle,
                            animated: conn.edge_animated,
                            style: conn.edge_style.clone(),
                            animation_direction: conn.connection_flow,
                        });
                    }
                }
            }
        }

        graph
    }

    pub fn skeleton_edges(&self) -> impl Iterator<Item = &LayoutEdge> {
        self.edges.iter().filter(|edge| edge.is_skeleton())
    }
}

fn class_name(status: Option<NodeStatus>) -> String {
    let color = status.map(NodeStatus::color).unwrap_or("default");
    match status.and_then(NodeStatus::modifier) {
        Some(modifier) => format!("status--{color} node--{modifier}"),
        None => format!("status--{color}"),
    }
}
