//! Implicit Elsewhere augmentation: every process group gets an implicit
//! bundle to and from Elsewhere unless the definition already supplies
//! one, so every process's un-modelled flows still appear somewhere in
//! the diagram.
//!
//! Grounded on
//! `examples/original_source/sankeyview/augment_view_graph.py`
//! (`elsewhere_bundles`/`augment`/`check_order_edges`). Per SPEC_FULL.md
//! §10.7 (Open Question resolution), both the original's waypointed mode
//! and a waypoint-free stub mode are kept, selected by the caller.

use crate::sankey_definition::{Bundle, NodeKind, NodeRef, Ordering, SankeyDefinition, Waypoint};
use crate::view_graph::ViewGraph;
use std::collections::{BTreeMap, BTreeSet};

/// Whether implicit Elsewhere bundles get a dedicated waypoint placed in
/// the layered graph (the original's default) or route directly with no
/// intermediate node (`--no-elsewhere-waypoints`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElsewhereMode {
    Waypointed,
    Stub,
}

/// New waypoints and bundles needed so every process group has at least
/// one bundle to Elsewhere and one bundle from Elsewhere.
pub fn elsewhere_bundles(
    definition: &SankeyDefinition,
) -> (BTreeMap<String, Waypoint>, BTreeMap<String, Bundle>) {
    let mut has_to_elsewhere: BTreeSet<&str> = BTreeSet::new();
    let mut has_from_elsewhere: BTreeSet<&str> = BTreeSet::new();
    for bundle in definition.bundles.values() {
        if bundle.target.is_elsewhere() {
            if let Some(id) = bundle.source.as_node_id() {
                has_to_elsewhere.insert(id);
            }
        }
        if bundle.source.is_elsewhere() {
            if let Some(id) = bundle.target.as_node_id() {
                has_from_elsewhere.insert(id);
            }
        }
    }

    let num_layers = definition.ordering.num_layers() as i64;
    let no_bundles = definition.bundles.is_empty();

    let mut new_waypoints = BTreeMap::new();
    let mut new_bundles = BTreeMap::new();

    for (id, node) in &definition.nodes {
        let NodeKind::ProcessGroup(pg) = node else {
            continue;
        };
        let Some((r, _, _)) = definition.ordering.indices(id) else {
            continue;
        };
        let r = r as i64;
        let d_rank = pg.direction.rank_step();

        if no_bundles || ((0..num_layers).contains(&(r + d_rank)) && !has_to_elsewhere.contains(id.as_str()))
        {
            let dummy_id = format!("__{id}>");
            new_waypoints.insert(dummy_id.clone(), Waypoint { partition: None, direction: pg.direction, title: None });
            let mut bundle = Bundle::new(NodeRef::Node(id.clone()), NodeRef::Elsewhere);
            bundle.waypoints = vec![dummy_id.clone()];
            new_bundles.insert(dummy_id, bundle);
        }

        if no_bundles
            || ((0..num_layers).contains(&(r - d_rank)) && !has_from_elsewhere.contains(id.as_str()))
        {
            let dummy_id = format!("__>{id}");
            new_waypoints.insert(dummy_id.clone(), Waypoint { partition: None, direction: pg.direction, title: None });
            let mut bundle = Bundle::new(NodeRef::Elsewhere, NodeRef::Node(id.clone()));
            bundle.waypoints = vec![dummy_id.clone()];
            new_bundles.insert(dummy_id, bundle);
        }
    }

    (new_waypoints, new_bundles)
}

/// Grow `ordering` by one empty layer at rank `r + dr` if that rank falls
/// off either end, shifting `r` to stay correct when a layer was
/// prepended.
fn check_order_edges(ordering: &mut Ordering, r: i64, dr: i64) -> i64 {
    let num_bands = ordering.layers.first().map(|l| l.len()).unwrap_or(1);
    if r + dr >= ordering.layers.len() as i64 {
        ordering.ensure_layer(ordering.layers.len() as i64, num_bands);
        r
    } else if r + dr < 0 {
        ordering.ensure_layer(-1, num_bands);
        r + 1
    } else {
        r
    }
}

/// Place each new implicit bundle's waypoint into the layered graph
/// (`Waypointed` mode), or skip placement entirely and let the combined
/// router treat the bundle as a direct Elsewhere edge (`Stub` mode).
pub fn augment(
    graph: &mut ViewGraph,
    ordering: &mut Ordering,
    new_waypoints: &BTreeMap<String, Waypoint>,
    new_bundles: &BTreeMap<String, Bundle>,
    mode: ElsewhereMode,
) {
    if mode == ElsewhereMode::Stub {
        for wp_id in new_waypoints.keys() {
            graph.dummy_waypoints.remove(wp_id);
        }
        for (bundle_id, bundle) in new_bundles {
            graph.record_segment(
                bundle_id,
                bundle.source.as_node_id(),
                bundle.target.as_node_id(),
            );
        }
        return;
    }

    for (bundle_id, bundle) in new_bundles {
        let w = &bundle.waypoints[0];
        let waypoint = new_waypoints[w].clone();

        if bundle.to_elsewhere() {
            let source = bundle.source.as_node_id().unwrap();
            let Some((r, _, _)) = ordering.indices(source) else { continue };
            let d_rank = waypoint.direction.rank_step();
            graph.dummy_waypoints.insert(w.clone(), waypoint.clone());

            let r = check_order_edges(ordering, r as i64, d_rank);
            let this_layer = ordering.ensure_layer(r + d_rank, ordering.layers.first().map(|l| l.len()).unwrap_or(1));
            let source_layer = ordering.ensure_layer(r, ordering.layers.first().map(|l| l.len()).unwrap_or(1));

            let (i, j) = crate::view_graph::new_node_indices_below(
                graph,
                &ordering.layers[this_layer],
                &ordering.layers[source_layer],
                w,
            );
            graph.add_edge(source, w, bundle_id);
            graph.record_segment(bundle_id, Some(source), Some(w));
            graph.record_segment(bundle_id, Some(w), None);
            ordering.insert(this_layer, i, j, w.clone());
        } else if bundle.from_elsewhere() {
            let target = bundle.target.as_node_id().unwrap();
            let Some((r, _, _)) = ordering.indices(target) else { continue };
            let d_rank = waypoint.direction.rank_step();
            graph.dummy_waypoints.insert(w.clone(), waypoint.clone());

            let r = check_order_edges(ordering, r as i64, -d_rank);
            let this_layer = ordering.ensure_layer(r - d_rank, ordering.layers.first().map(|l| l.len()).unwrap_or(1));
            let target_layer = ordering.ensure_layer(r, ordering.layers.first().map(|l| l.len()).unwrap_or(1));

            let (i, j) = crate::view_graph::new_node_indices_below(
                graph,
                &ordering.layers[this_layer],
                &ordering.layers[target_layer],
                w,
            );
            graph.add_edge(w, target, bundle_id);
            graph.record_segment(bundle_id, None, Some(w));
            graph.record_segment(bundle_id, Some(w), Some(target));
            ordering.insert(this_layer, i, j, w.clone());
        }
    }
}
