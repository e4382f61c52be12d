//! Layered left-to-right placement.
//!
//! Columns come from longest-path layering over the connection graph with
//! feedback edges ignored; rows inside a column follow declaration order.
//! Positions depend only on graph structure, so running the pass again, or
//! on a structurally identical design, yields the same coordinates.

mod ranking;
pub(crate) mod types;
pub use types::*;

use crate::graph::{CircuitGraph, GraphEdge, GraphNode, Position};
use ranking::{feedback_edges, longest_path_layers, rank_within_layers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Horizontal distance between consecutive layers.
    pub layer_spacing: f32,
    /// Vertical distance between consecutive rows in a layer.
    pub row_spacing: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub node_width: f32,
    pub node_base_height: f32,
    pub port_row_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layer_spacing: 350.0,
            row_spacing: 220.0,
            origin_x: 0.0,
            origin_y: 0.0,
            node_width: 256.0,
            node_base_height: 96.0,
            port_row_height: 18.0,
        }
    }
}

impl LayoutConfig {
    pub fn position_for(&self, layer: usize, rank: usize) -> Position {
        Position {
            x: self.origin_x + layer as f32 * self.layer_spacing,
            y: self.origin_y + rank as f32 * self.row_spacing,
        }
    }

    /// Card height used by the static preview for a block with this many
    /// port rows.
    pub fn node_height(&self, port_rows: usize) -> f32 {
        self.node_base_height + port_rows as f32 * self.port_row_height
    }
}

/// Assign a position to every node. Node and edge lists are left otherwise
/// untouched; edges whose endpoints fall outside `nodes` are ignored.
pub fn layout(nodes: &mut [GraphNode], edges: &[GraphEdge], config: &LayoutConfig) -> Layering {
    let node_count = nodes.len();
    let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(edges.len());
    let mut pair_edge: Vec<usize> = Vec::with_capacity(edges.len());
    for (edge_idx, edge) in edges.iter().enumerate() {
        if edge.source_index < node_count && edge.target_index < node_count {
            pairs.push((edge.source_index, edge.target_index));
            pair_edge.push(edge_idx);
        }
    }

    let feedback_mask = feedback_edges(node_count, &pairs);
    let layers = longest_path_layers(node_count, &pairs, &feedback_mask);
    let ranks = rank_within_layers(&layers);
    let layer_count = layers.iter().copied().max().map_or(0, |max| max + 1);

    for (idx, node) in nodes.iter_mut().enumerate() {
        node.position = config.position_for(layers[idx], ranks[idx]);
    }

    let feedback: Vec<usize> = feedback_mask
        .iter()
        .zip(&pair_edge)
        .filter(|(is_feedback, _)| **is_feedback)
        .map(|(_, edge_idx)| *edge_idx)
        .collect();

    tracing::debug!(
        nodes = node_count,
        layers = layer_count,
        feedback = feedback.len(),
        "laid out circuit graph"
    );

    Layering {
        layers,
        ranks,
        layer_count,
        feedback,
    }
}

pub fn layout_graph(graph: &mut CircuitGraph, config: &LayoutConfig) -> Layering {
    layout(&mut graph.nodes, &graph.edges, config)
}
