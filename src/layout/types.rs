use serde::Serialize;

/// What the layout pass decided, alongside the positions it wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layering {
    /// Layer (column) per node, indexed like the node list.
    pub layers: Vec<usize>,
    /// Row within the node's layer.
    pub ranks: Vec<usize>,
    pub layer_count: usize,
    /// Indices of edges ignored for layering (back-edges and self-loops).
    pub feedback: Vec<usize>,
}

impl Layering {
    pub fn is_feedback(&self, edge_index: usize) -> bool {
        self.feedback.binary_search(&edge_index).is_ok()
    }

    /// Node indices per layer, each in declaration order.
    pub fn columns(&self) -> Vec<Vec<usize>> {
        let mut columns: Vec<Vec<usize>> = vec![Vec::new(); self.layer_count];
        for (node, layer) in self.layers.iter().enumerate() {
            if let Some(bucket) = columns.get_mut(*layer) {
                bucket.push(node);
            }
        }
        columns
    }
}
