//! Executor: streams a flow table through a compiled [`crate::spec::WeaverSpec`]'s
//! routing tree, aggregates measures per edge, and assembles the final
//! nodes/links/groups/ordering the caller consumes.
//!
//! Grounded on
//! `examples/original_source/src/floweaver/compiler/execute.py`
//! (`execute_weave`/`_execute_with_routing_tree`/`_aggregate`/`_apply_color`/
//! `_build_groups`/`_filter_ordering`) and
//! `examples/original_source/src/floweaver/sankey_data.py`
//! (`SankeyNode`/`SankeyLink` field shapes). The two alternate wire formats
//! `to_json(format=...)` builds (`"sankey-v2"` and `"widget"`) are not
//! reproduced here — per the original specification §1, widget/JSON
//! renderers are out of scope collaborators; this module only produces the
//! plain result structures the original spec's Lifecycles section says the
//! executor owns.

use crate::combined_router::RoutingTree;
use crate::dataset::FlowTable;
use crate::spec::{Aggregation, BundleSpec, EdgeSpec, GroupSpec, NodeSpec, WeaverSpec};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// One realised node of the diagram: a process group or waypoint that
/// appears on at least one link.
#[derive(Debug, Clone, PartialEq)]
pub struct SankeyNode {
    pub id: String,
    pub title: String,
    pub direction: crate::spec::NodeDirection,
    pub hidden: bool,
    pub style: String,
    pub from_elsewhere_links: Vec<SankeyLink>,
    pub to_elsewhere_links: Vec<SankeyLink>,
}

/// One realised link: an edge with at least one matching flow row.
#[derive(Debug, Clone, PartialEq)]
pub struct SankeyLink {
    pub source: Option<String>,
    pub target: Option<String>,
    pub material: String,
    pub time: String,
    pub link_width: f64,
    pub data: BTreeMap<String, f64>,
    pub title: String,
    pub color: String,
    pub opacity: f64,
    /// Row indices of `flows` that fell into this link, in the order rows
    /// were routed (stable under reordering the *output*, per the original
    /// specification §8 testable property 8 — callers that need this
    /// stable must route a stably-ordered table).
    pub original_flows: Vec<usize>,
}

/// One realised group: a partition's explicit groups, filtered to the
/// nodes actually used and elided when visually redundant.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResult {
    pub id: String,
    pub title: String,
    pub node_type: crate::spec::NodeSpecType,
    pub nodes: Vec<String>,
}

/// The executor's output: the caller-owned final diagram data (original
/// specification §3, Lifecycles).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SankeyData {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
    pub groups: Vec<GroupResult>,
    pub ordering: Vec<Vec<Vec<String>>>,
}

/// Route every row of `flows` through `tree` in parallel, merging each
/// worker's per-edge row-index buckets. Associative and order-independent
/// per the original specification §5 concurrency model: the executor's
/// per-row tree traversal is independent per row, so a parallel
/// implementation may partition the row range across threads and merge at
/// the end.
fn route_flows_parallel(tree: &RoutingTree, flows: &FlowTable) -> BTreeMap<usize, Vec<usize>> {
    (0..flows.len())
        .into_par_iter()
        .fold(BTreeMap::new, |mut acc: BTreeMap<usize, Vec<usize>>, idx| {
            let get_value = |attr: &str| flows.get_value(idx, attr);
            for edge_id in crate::tree::evaluate(tree, &get_value) {
                acc.entry(edge_id).or_default().push(idx);
            }
            acc
        })
        .reduce(BTreeMap::new, |mut a, b| {
            for (edge_id, mut rows) in b {
                a.entry(edge_id).or_default().append(&mut rows);
            }
            a
        })
}

/// Aggregate each declared measure over `flows` restricted to
/// `row_indices`. A missing column sums to `0.0`; a missing column's mean
/// is absent from the result entirely (the original specification §4.7/§7
/// "NaN-absent" contract — see DESIGN.md for the literal-vs-reference
/// divergence this follows).
fn aggregate(
    flows: &FlowTable,
    row_indices: &[usize],
    measures: &[crate::spec::MeasureSpec],
) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for m in measures {
        let values: Vec<f64> = row_indices
            .iter()
            .filter_map(|&idx| flows.get_measure(idx, &m.column))
            .collect();
        match m.aggregation {
            Aggregation::Sum => {
                out.insert(m.column.clone(), values.iter().sum());
            }
            Aggregation::Mean => {
                if !values.is_empty() {
                    out.insert(m.column.clone(), values.iter().sum::<f64>() / values.len() as f64);
                }
            }
        }
    }
    out
}

fn compute_title(edge: &EdgeSpec) -> String {
    edge.material.clone()
}

/// Execute a compiled spec against `flows`, producing the caller-owned
/// final diagram.
pub fn execute_weave(spec: &WeaverSpec, flows: &FlowTable) -> SankeyData {
    debug!(rows = flows.len(), "routing flows through decision tree");
    let edge_flow_map = route_flows_parallel(&spec.routing_tree, flows);

    let mut links: Vec<SankeyLink> = Vec::new();
    let mut from_elsewhere: BTreeMap<String, Vec<SankeyLink>> = BTreeMap::new();
    let mut to_elsewhere: BTreeMap<String, Vec<SankeyLink>> = BTreeMap::new();

    for (edge_index, row_indices) in &edge_flow_map {
        if row_indices.is_empty() {
            continue;
        }
        let Some(edge) = spec.edges.get(*edge_index) else {
            continue;
        };
        let data = aggregate(flows, row_indices, &spec.measures);
        let link_width = data.get(&spec.display.link_width).copied().unwrap_or(0.0);
        let color = crate::color::apply_color(edge, &data, &spec.display);
        let title = compute_title(edge);

        let link = SankeyLink {
            source: edge.source.clone(),
            target: edge.target.clone(),
            material: edge.material.clone(),
            time: edge.time.clone(),
            link_width,
            data,
            title,
            color,
            opacity: 1.0,
            original_flows: row_indices.clone(),
        };

        match (&edge.source, &edge.target) {
            (None, Some(target)) => from_elsewhere.entry(target.clone()).or_default().push(link),
            (Some(source), None) => to_elsewhere.entry(source.clone()).or_default().push(link),
            _ => links.push(link),
        }
    }

    let mut nodes_in_regular_edges: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for link in &links {
        if let Some(s) = &link.source {
            nodes_in_regular_edges.insert(s.clone());
        }
        if let Some(t) = &link.target {
            nodes_in_regular_edges.insert(t.clone());
        }
    }

    let mut used = nodes_in_regular_edges.clone();
    used.extend(from_elsewhere.keys().cloned());
    used.extend(to_elsewhere.keys().cloned());

    let nodes: Vec<SankeyNode> = spec
        .nodes
        .iter()
        .filter(|(id, _)| used.contains(*id))
        .map(|(id, node_spec)| SankeyNode {
            id: id.clone(),
            title: node_spec.title.clone(),
            direction: node_spec.direction,
            hidden: node_spec.hidden || node_spec.title.is_empty(),
            style: node_spec.style.clone(),
            from_elsewhere_links: from_elsewhere.get(id).cloned().unwrap_or_default(),
            to_elsewhere_links: to_elsewhere.get(id).cloned().unwrap_or_default(),
        })
        .collect();

    let groups = build_groups(&spec.groups, &spec.nodes, &nodes_in_regular_edges);
    let ordering = filter_ordering(&spec.ordering, &used);

    SankeyData {
        nodes,
        links,
        groups,
        ordering,
    }
}

/// Drop groups with no used nodes; drop single-node groups whose sole
/// node's title equals the group's effective title (avoids visually
/// redundant grouping, original specification §4.7 step 5).
fn build_groups(
    group_specs: &[GroupSpec],
    node_specs: &BTreeMap<String, NodeSpec>,
    used_nodes: &std::collections::BTreeSet<String>,
) -> Vec<GroupResult> {
    let mut groups = Vec::new();
    for g in group_specs {
        let nodes_in_group: Vec<String> = g
            .nodes
            .iter()
            .filter(|n| used_nodes.contains(*n))
            .cloned()
            .collect();
        if nodes_in_group.is_empty() {
            continue;
        }

        let node_type = node_specs[&nodes_in_group[0]].node_type;

        let include = if nodes_in_group.len() == 1 {
            let node_title = &node_specs[&nodes_in_group[0]].title;
            let group_title = if g.title.is_empty() { &g.id } else { &g.title };
            node_title != group_title
        } else {
            true
        };

        if include {
            groups.push(GroupResult {
                id: g.id.clone(),
                title: g.title.clone(),
                node_type,
                nodes: nodes_in_group,
            });
        }
    }
    groups
}

/// Filter the spec's ordering to nodes that are used, dropping any layer
/// left with no nodes in any band at all.
fn filter_ordering(
    ordering: &[Vec<Vec<String>>],
    used_nodes: &std::collections::BTreeSet<String>,
) -> Vec<Vec<Vec<String>>> {
    let mut filtered = Vec::new();
    for layer in ordering {
        let filtered_layer: Vec<Vec<String>> = layer
            .iter()
            .map(|band| band.iter().filter(|n| used_nodes.contains(*n)).cloned().collect())
            .collect();
        if filtered_layer.iter().any(|band| !band.is_empty()) {
            filtered.push(filtered_layer);
        }
    }
    filtered
}

#[allow(dead_code)]
fn bundle_title(id: &str, bundles: &[BundleSpec]) -> Option<String> {
    bundles.iter().find(|b| b.id == id).map(|b| b.id.clone())
}
