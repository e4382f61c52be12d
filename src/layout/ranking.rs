use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Mark edges that close a cycle.
///
/// Iterative DFS over an adjacency list of node indices. Roots are taken in
/// declaration order, nodes without incoming edges first, so the edge that
/// returns to an earlier stage is the one classified as feedback. Self-loops
/// are always feedback.
pub(super) fn feedback_edges(node_count: usize, edges: &[(usize, usize)]) -> Vec<bool> {
    let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); node_count];
    let mut indegree = vec![0usize; node_count];
    for (edge_idx, &(from, to)) in edges.iter().enumerate() {
        adjacency[from].push((to, edge_idx));
        if from != to {
            indegree[to] += 1;
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let mut feedback = vec![false; edges.len()];
    let mut marks = vec![Mark::Unvisited; node_count];
    let roots = (0..node_count)
        .filter(|node| indegree[*node] == 0)
        .chain((0..node_count).filter(|node| indegree[*node] > 0));

    for root in roots {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::OnStack;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some((node, cursor)) = stack.last_mut() {
            let node = *node;
            let Some(&(next, edge_idx)) = adjacency[node].get(*cursor) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            *cursor += 1;
            match marks[next] {
                Mark::OnStack => feedback[edge_idx] = true,
                Mark::Unvisited => {
                    marks[next] = Mark::OnStack;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }

    feedback
}

/// Longest-path layering over the edges not marked as feedback.
///
/// Nodes are released in topological order, ties broken by declaration
/// index, and each forward edge pushes its target at least one layer past
/// its source.
pub(super) fn longest_path_layers(
    node_count: usize,
    edges: &[(usize, usize)],
    feedback: &[bool],
) -> Vec<usize> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    let mut indegree = vec![0usize; node_count];
    for (edge_idx, &(from, to)) in edges.iter().enumerate() {
        if feedback[edge_idx] {
            continue;
        }
        adjacency[from].push(to);
        indegree[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..node_count)
        .filter(|node| indegree[*node] == 0)
        .map(Reverse)
        .collect();
    let mut layers = vec![0usize; node_count];
    let mut processed = 0usize;

    while let Some(Reverse(node)) = ready.pop() {
        processed += 1;
        let layer = layers[node];
        for &next in &adjacency[node] {
            layers[next] = layers[next].max(layer + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    // Feedback removal leaves a DAG, so every node is released.
    debug_assert_eq!(processed, node_count);
    layers
}

/// Row of each node inside its layer, by declaration index.
pub(super) fn rank_within_layers(layers: &[usize]) -> Vec<usize> {
    let layer_count = layers.iter().copied().max().map_or(0, |max| max + 1);
    let mut next_rank = vec![0usize; layer_count];
    layers
        .iter()
        .map(|layer| {
            let rank = next_rank[*layer];
            next_rank[*layer] += 1;
            rank
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_layers_increase() {
        let edges = [(0, 1), (1, 2)];
        let feedback = feedback_edges(3, &edges);
        assert_eq!(feedback, vec![false, false]);
        assert_eq!(longest_path_layers(3, &edges, &feedback), vec![0, 1, 2]);
    }

    #[test]
    fn longest_path_wins_over_shortcut() {
        // 0 -> 1 -> 2 and a shortcut 0 -> 2.
        let edges = [(0, 1), (1, 2), (0, 2)];
        let feedback = feedback_edges(3, &edges);
        assert_eq!(longest_path_layers(3, &edges, &feedback), vec![0, 1, 2]);
    }

    #[test]
    fn two_cycle_breaks_on_return_edge() {
        let edges = [(0, 1), (1, 0)];
        let feedback = feedback_edges(2, &edges);
        assert_eq!(feedback, vec![false, true]);
        assert_eq!(longest_path_layers(2, &edges, &feedback), vec![0, 1]);
    }

    #[test]
    fn feedback_loop_after_source() {
        // Declared out of flow order: vca(0) <-> vcf(1), fed by osc(2).
        let edges = [(2, 1), (1, 0), (0, 1)];
        let feedback = feedback_edges(3, &edges);
        assert_eq!(feedback, vec![false, false, true]);
        assert_eq!(longest_path_layers(3, &edges, &feedback), vec![2, 1, 0]);
    }

    #[test]
    fn self_loop_is_feedback() {
        let edges = [(0, 0), (0, 1)];
        let feedback = feedback_edges(2, &edges);
        assert_eq!(feedback, vec![true, false]);
        assert_eq!(longest_path_layers(2, &edges, &feedback), vec![0, 1]);
    }

    #[test]
    fn pure_cycle_without_sources_terminates() {
        let edges = [(0, 1), (1, 2), (2, 0)];
        let feedback = feedback_edges(3, &edges);
        assert_eq!(feedback.iter().filter(|f| **f).count(), 1);
        assert_eq!(longest_path_layers(3, &edges, &feedback), vec![0, 1, 2]);
    }

    #[test]
    fn ranks_follow_declaration_order() {
        assert_eq!(rank_within_layers(&[0, 1, 0, 1, 2]), vec![0, 0, 1, 1, 0]);
        assert!(rank_within_layers(&[]).is_empty());
    }
}
