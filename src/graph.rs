//! Node/edge records for the diagram surface.
//!
//! Identity is positional: a node id depends only on the block's index in
//! the design, and an edge id only on its four endpoints. Renaming a block
//! therefore never changes what the diagram widget considers the same node.

use crate::design::BlockSpec;
use crate::ports::{BlockPorts, PortDirection};
use crate::signal::{SignalCategory, classify};
use crate::validate::ValidatedConnection;
use serde::{Deserialize, Serialize};

pub const NODE_TYPE: &str = "circuitBlock";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    pub block: BlockSpec,
    pub ports: BlockPorts,
    pub has_input_anchor: bool,
    pub has_output_anchor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub position: Position,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
    pub signal_type: String,
    pub category: SignalCategory,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Set when the declared signal type disagrees with an endpoint.
    pub flagged: bool,
    pub flow_index: usize,
    #[serde(skip)]
    pub source_index: usize,
    #[serde(skip)]
    pub target_index: usize,
}

impl GraphEdge {
    pub fn is_self_loop(&self) -> bool {
        self.source_index == self.target_index
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CircuitGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub fn node_id(block_index: usize) -> String {
    format!("block-{block_index}")
}

pub fn edge_id(source: &str, source_handle: &str, target: &str, target_handle: &str) -> String {
    format!("e-{source}-{source_handle}-{target}-{target_handle}")
}

pub fn build(blocks: &[BlockSpec], connections: &[ValidatedConnection]) -> CircuitGraph {
    let ports: Vec<BlockPorts> = blocks.iter().map(BlockPorts::resolve).collect();
    build_with_ports(blocks, ports, connections)
}

/// Build the graph from already-resolved ports (one entry per block).
pub fn build_with_ports(
    blocks: &[BlockSpec],
    ports: Vec<BlockPorts>,
    connections: &[ValidatedConnection],
) -> CircuitGraph {
    let nodes: Vec<GraphNode> = blocks
        .iter()
        .zip(ports)
        .enumerate()
        .map(|(idx, (block, ports))| GraphNode {
            id: node_id(idx),
            node_type: NODE_TYPE,
            position: Position::ORIGIN,
            data: NodeData {
                label: block.display_name(idx).into_owned(),
                has_input_anchor: ports.has_anchor(PortDirection::Input),
                has_output_anchor: ports.has_anchor(PortDirection::Output),
                block: block.clone(),
                ports,
            },
        })
        .collect();

    let edges: Vec<GraphEdge> = connections
        .iter()
        .map(|conn| {
            let source = node_id(conn.source.block);
            let target = node_id(conn.target.block);
            let source_handle = PortDirection::Output.handle_id(conn.source.port);
            let target_handle = PortDirection::Input.handle_id(conn.target.port);
            let class = classify(&conn.signal_type);
            GraphEdge {
                id: edge_id(&source, &source_handle, &target, &target_handle),
                source,
                source_handle,
                target,
                target_handle,
                signal_type: conn.signal_type.clone(),
                category: class.category,
                color: class.color,
                label: conn.description.clone(),
                flagged: conn.mismatch,
                flow_index: conn.flow_index,
                source_index: conn.source.block,
                target_index: conn.target.block,
            }
        })
        .collect();

    tracing::debug!(nodes = nodes.len(), edges = edges.len(), "built circuit graph");
    CircuitGraph { nodes, edges }
}
