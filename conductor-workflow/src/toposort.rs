//! Kahn's algorithm, shared by the validator's cycle check (§4.1 step 5)
//! and the DAG executor's scheduling order (§4.2).

use conductor_protocol::NodeId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Compute a topological order over `nodes` given `edges` (source, target
/// pairs). Edges referencing an id outside `nodes` are ignored by the
/// caller's responsibility — pass only validated edges in.
///
/// Returns `Ok(order)` or `Err(remaining)` — the node ids left over once
/// no more in-degree-zero nodes exist, i.e. the nodes participating in a cycle.
pub fn topological_order(nodes: &[NodeId], edges: &[(NodeId, NodeId)]) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let mut in_degree: HashMap<NodeId, usize> = nodes.iter().map(|n| (n.clone(), 0)).collect();
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = nodes.iter().map(|n| (n.clone(), Vec::new())).collect();

    for (source, target) in edges {
        if !in_degree.contains_key(source) || !in_degree.contains_key(target) {
            continue;
        }
        adjacency.get_mut(source).unwrap().push(target.clone());
        *in_degree.get_mut(target).unwrap() += 1;
    }

    let mut queue: VecDeque<NodeId> =
        nodes.iter().filter(|n| in_degree[*n] == 0).cloned().collect();
    let mut order = Vec::with_capacity(nodes.len());
    let mut visited: HashSet<NodeId> = HashSet::new();

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node.clone()) {
            continue;
        }
        order.push(node.clone());
        for next in &adjacency[&node] {
            let degree = in_degree.get_mut(next).unwrap();
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(next.clone());
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let remaining: Vec<NodeId> = nodes.iter().filter(|n| !visited.contains(*n)).cloned().collect();
        Err(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    #[test]
    fn orders_a_simple_chain() {
        let nodes = vec![id("a"), id("b"), id("c")];
        let edges = vec![(id("a"), id("b")), (id("b"), id("c"))];
        let order = topological_order(&nodes, &edges).unwrap();
        assert_eq!(order, vec![id("a"), id("b"), id("c")]);
    }

    #[test]
    fn detects_a_cycle() {
        let nodes = vec![id("a"), id("b")];
        let edges = vec![(id("a"), id("b")), (id("b"), id("a"))];
        let err = topological_order(&nodes, &edges).unwrap_err();
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn ignores_dangling_edges() {
        let nodes = vec![id("a"), id("b")];
        let edges = vec![(id("a"), id("missing"))];
        let order = topological_order(&nodes, &edges).unwrap();
        assert_eq!(order.len(), 2);
    }
}
