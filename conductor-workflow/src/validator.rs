//! The workflow validator (§4.1, C4): fail-closed graph checks run before
//! every persistence write.

use crate::model::{Node, Workflow};
use crate::registry::NodeExecutorRegistry;
use crate::toposort::topological_order;
use conductor_protocol::{NodeId, NodeKind, ToolId, ToolRepository, ToolStatus, ValidationError, ValidationIssue};
use std::collections::{HashMap, HashSet};

/// Run the full validation procedure (§4.1 "Procedure and ordering").
///
/// On success, returns the normalized workflow (tool-id aliases resolved)
/// — callers should persist this copy, not the original. On failure,
/// returns every issue found across all six steps, or a single
/// `RepositoryUnavailable` if a dependency required to validate a node
/// could not be reached (the fail-closed principle: unknown is never valid).
pub async fn validate(
    workflow: &Workflow,
    tool_repo: &dyn ToolRepository,
    registry: &NodeExecutorRegistry,
) -> Result<Workflow, ValidationError> {
    let mut workflow = workflow.clone();
    let mut issues = Vec::new();

    // Step 1: normalize tool-kind node configs.
    normalize(&mut workflow);

    // Step 2: main-subgraph existence.
    check_main_subgraph(&workflow, &mut issues);

    // Step 3: node-id uniqueness.
    check_duplicate_ids(&workflow, &mut issues);

    // Step 4: edge endpoints.
    check_edges(&workflow, &mut issues);

    // Step 5: topological order / cycle detection.
    let node_ids: Vec<NodeId> = workflow.nodes.iter().map(|n| n.id.clone()).collect();
    let edge_pairs: Vec<(NodeId, NodeId)> =
        workflow.edges.iter().map(|e| (e.source.clone(), e.target.clone())).collect();
    if let Err(cycle) = topological_order(&node_ids, &edge_pairs) {
        issues.push(
            ValidationIssue::new("cycle_detected", "the graph contains a cycle", "edges")
                .with_meta(serde_json::json!({"nodes": cycle})),
        );
    }

    // Step 6: per-node kind-specific checks, including tool repository lookups.
    match check_nodes(&workflow, tool_repo, registry).await {
        Ok(mut node_issues) => issues.append(&mut node_issues),
        Err(e) => return Err(e),
    }

    if issues.is_empty() {
        Ok(workflow)
    } else {
        Err(ValidationError::Invalid(issues))
    }
}

/// Strip whitespace from tool-id strings and rename the legacy `toolId`
/// alias to the canonical `tool_id` key (§4.1 step 1).
pub fn normalize(workflow: &mut Workflow) {
    for node in &mut workflow.nodes {
        if node.kind != NodeKind::Tool {
            continue;
        }
        if let Some(obj) = node.config.as_object_mut() {
            if let Some(alias) = obj.remove("toolId") {
                obj.entry("tool_id").or_insert(alias);
            }
            if let Some(serde_json::Value::String(id)) = obj.get_mut("tool_id") {
                *id = id.trim().to_string();
            }
        }
    }
}

fn check_duplicate_ids(workflow: &Workflow, issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    let mut duplicates = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.id.clone()) {
            duplicates.insert(node.id.clone());
        }
    }
    if !duplicates.is_empty() {
        issues.push(
            ValidationIssue::new("duplicate_node_id", "duplicate node identifiers", "nodes")
                .with_meta(serde_json::json!({"ids": duplicates.into_iter().collect::<Vec<_>>()})),
        );
    }
}

fn check_edges(workflow: &Workflow, issues: &mut Vec<ValidationIssue>) {
    let node_ids: HashSet<&NodeId> = workflow.nodes.iter().map(|n| &n.id).collect();
    for (i, edge) in workflow.edges.iter().enumerate() {
        if edge.source == edge.target {
            issues.push(ValidationIssue::new(
                "invalid_edges",
                "edge source and target are the same node",
                format!("edges[{i}]"),
            ));
            continue;
        }
        if !node_ids.contains(&edge.source) {
            issues.push(ValidationIssue::new(
                "missing_node",
                format!("edge source references unknown node {}", edge.source),
                format!("edges[{i}].source"),
            ));
        }
        if !node_ids.contains(&edge.target) {
            issues.push(ValidationIssue::new(
                "missing_node",
                format!("edge target references unknown node {}", edge.target),
                format!("edges[{i}].target"),
            ));
        }
    }
}

fn check_main_subgraph(workflow: &Workflow, issues: &mut Vec<ValidationIssue>) {
    if workflow.nodes.is_empty() {
        issues.push(ValidationIssue::new("empty_workflow", "workflow has no nodes", "nodes"));
        return;
    }

    let starts: Vec<&NodeId> = workflow.nodes.iter().filter(|n| n.kind == NodeKind::Start).map(|n| &n.id).collect();
    let ends: Vec<&NodeId> = workflow.nodes.iter().filter(|n| n.kind == NodeKind::End).map(|n| &n.id).collect();

    if starts.is_empty() {
        issues.push(ValidationIssue::new("missing_start", "workflow has no start node", "nodes"));
    }
    if ends.is_empty() {
        issues.push(ValidationIssue::new("missing_end", "workflow has no end node", "nodes"));
    }
    if starts.is_empty() || ends.is_empty() {
        return;
    }

    let forward: HashMap<&NodeId, Vec<&NodeId>> = adjacency(&workflow.nodes, &workflow.edges, false);
    let backward: HashMap<&NodeId, Vec<&NodeId>> = adjacency(&workflow.nodes, &workflow.edges, true);

    let forward_reachable = reachable(&starts, &forward);
    let backward_reachable = reachable(&ends, &backward);
    let main_subgraph: HashSet<&NodeId> = forward_reachable.intersection(&backward_reachable).copied().collect();

    if main_subgraph.is_empty() {
        issues.push(ValidationIssue::new(
            "no_start_to_end_path",
            "no path exists from any start node to any end node",
            "nodes",
        ));
        return;
    }

    let has_intermediate = workflow
        .nodes
        .iter()
        .any(|n| main_subgraph.contains(&n.id) && n.kind != NodeKind::Start && n.kind != NodeKind::End);
    if !has_intermediate {
        issues.push(ValidationIssue::new(
            "missing_intermediate_nodes",
            "the main subgraph contains no node other than start/end",
            "nodes",
        ));
    }
}

fn adjacency<'a>(
    nodes: &'a [Node],
    edges: &'a [crate::model::Edge],
    reversed: bool,
) -> HashMap<&'a NodeId, Vec<&'a NodeId>> {
    let mut map: HashMap<&NodeId, Vec<&NodeId>> = nodes.iter().map(|n| (&n.id, Vec::new())).collect();
    for edge in edges {
        let (from, to) = if reversed { (&edge.target, &edge.source) } else { (&edge.source, &edge.target) };
        if let Some(list) = map.get_mut(from) {
            list.push(to);
        }
    }
    map
}

fn reachable<'a>(roots: &[&'a NodeId], adjacency: &HashMap<&'a NodeId, Vec<&'a NodeId>>) -> HashSet<&'a NodeId> {
    let mut seen: HashSet<&NodeId> = roots.iter().copied().collect();
    let mut queue: Vec<&NodeId> = roots.to_vec();
    while let Some(node) = queue.pop() {
        if let Some(neighbors) = adjacency.get(node) {
            for next in neighbors {
                if seen.insert(next) {
                    queue.push(next);
                }
            }
        }
    }
    seen
}

async fn check_nodes(
    workflow: &Workflow,
    tool_repo: &dyn ToolRepository,
    registry: &NodeExecutorRegistry,
) -> Result<Vec<ValidationIssue>, ValidationError> {
    let mut issues = Vec::new();

    for (i, node) in workflow.nodes.iter().enumerate() {
        let path = format!("nodes[{i}]");

        if !registry.is_satisfied(&node.kind) {
            issues.push(ValidationIssue::new(
                "missing_executor",
                format!("no executor registered for node kind {}", node.kind.tag()),
                path.clone(),
            ));
        }

        match node.kind {
            NodeKind::ScriptA | NodeKind::ScriptB => {
                check_non_empty_string(&node.config, "code", "missing_code", &path, &mut issues);
            }
            NodeKind::Http => {
                check_non_empty_string(&node.config, "url", "missing_url", &path, &mut issues);
                check_non_empty_string(&node.config, "method", "missing_method", &path, &mut issues);
            }
            NodeKind::Tool => {
                check_tool_node(node, tool_repo, &path, &mut issues).await?;
            }
            _ => {}
        }
    }

    Ok(issues)
}

fn check_non_empty_string(
    config: &serde_json::Value,
    key: &str,
    missing_code: &'static str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    match config.get(key) {
        None => issues.push(ValidationIssue::new(missing_code, format!("missing required field: {key}"), format!("{path}.config.{key}"))),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
            issues.push(ValidationIssue::new(missing_code, format!("{key} must not be empty"), format!("{path}.config.{key}")))
        }
        Some(serde_json::Value::String(_)) => {}
        Some(_) => issues.push(ValidationIssue::new(
            "invalid_config",
            format!("{key} must be a string"),
            format!("{path}.config.{key}"),
        )),
    }
}

async fn check_tool_node(
    node: &Node,
    tool_repo: &dyn ToolRepository,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Result<(), ValidationError> {
    let Some(tool_id) = node.config.get("tool_id").and_then(|v| v.as_str()) else {
        issues.push(ValidationIssue::new("missing_tool_id", "tool node missing tool_id", format!("{path}.config.tool_id")));
        return Ok(());
    };
    if tool_id.is_empty() {
        issues.push(ValidationIssue::new("missing_tool_id", "tool node missing tool_id", format!("{path}.config.tool_id")));
        return Ok(());
    }

    match tool_repo.find(&ToolId::new(tool_id)).await {
        Ok(Some(tool)) => {
            if tool.status == ToolStatus::Deprecated {
                issues.push(ValidationIssue::new(
                    "tool_deprecated",
                    format!("tool {tool_id} is deprecated"),
                    format!("{path}.config.tool_id"),
                ));
            }
        }
        Ok(None) => issues.push(ValidationIssue::new(
            "tool_not_found",
            format!("tool {tool_id} does not exist"),
            format!("{path}.config.tool_id"),
        )),
        Err(e) => return Err(ValidationError::RepositoryUnavailable(e.to_string())),
    }
    Ok(())
}
