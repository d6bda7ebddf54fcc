//! Layered view graph: nodes placed into ranked layers and bands, with
//! dummy waypoint nodes inserted along multi-rank bundle spans so every
//! edge in the drawn graph connects adjacent layers.
//!
//! Grounded on `examples/original_source/sankeyview/view_graph.py`,
//! `.../dummy_nodes.py`, and the placement helpers in `.../ordering.py`
//! (`new_node_indices`, `median_value`, `neighbour_positions`,
//! `fill_unknown`), ported from networkx + a frozen `Ordering` value type
//! onto `petgraph` plus the mutable [`Ordering`](crate::sankey_definition::Ordering)
//! already used elsewhere in this crate.

use crate::error::{CompileError, CompileResult};
use crate::sankey_definition::{Direction, NodeRef, Ordering, SankeyDefinition, Waypoint};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Above,
    Below,
}

/// The layered graph of visible nodes plus inserted dummy waypoints. Edge
/// weights are the ids of every bundle routed along that edge.
pub struct ViewGraph {
    pub graph: DiGraph<String, Vec<String>>,
    pub index: BTreeMap<String, NodeIndex>,
    /// Waypoints synthesised here rather than declared in the original
    /// definition (dummy nodes placed at intermediate ranks).
    pub dummy_waypoints: BTreeMap<String, Waypoint>,
    /// Each bundle's ordered chain of drawn segments, recorded as each
    /// segment is placed rather than reconstructed afterwards from graph
    /// adjacency. `None` marks an Elsewhere endpoint.
    pub bundle_edges: BTreeMap<String, Vec<(Option<String>, Option<String>)>>,
}

impl ViewGraph {
    fn new() -> Self {
        ViewGraph {
            graph: DiGraph::new(),
            index: BTreeMap::new(),
            dummy_waypoints: BTreeMap::new(),
            bundle_edges: BTreeMap::new(),
        }
    }

    /// Record that `bundle_id` routes through the segment `(a, b)`, in
    /// order.
    pub(crate) fn record_segment(&mut self, bundle_id: &str, a: Option<&str>, b: Option<&str>) {
        self.bundle_edges
            .entry(bundle_id.to_string())
            .or_default()
            .push((a.map(str::to_string), b.map(str::to_string)));
    }

    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    fn has_edge(&self, a: &str, b: &str) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&ai), Some(&bi)) => self.graph.find_edge(ai, bi).is_some(),
            _ => false,
        }
    }

    pub(crate) fn add_edge(&mut self, a: &str, b: &str, bundle_id: &str) {
        let ai = self.ensure_node(a);
        let bi = self.ensure_node(b);
        if let Some(e) = self.graph.find_edge(ai, bi) {
            self.graph[e].push(bundle_id.to_string());
        } else {
            self.graph.add_edge(ai, bi, vec![bundle_id.to_string()]);
        }
    }

    /// `direction` of any node known either to the original definition or
    /// synthesised as a dummy waypoint here.
    pub fn direction(&self, id: &str, definition: &SankeyDefinition) -> Direction {
        if let Some(node) = definition.nodes.get(id) {
            return node.direction();
        }
        self.dummy_waypoints
            .get(id)
            .map(|w| w.direction)
            .unwrap_or_default()
    }
}

fn flatten_bands(bands: &[Vec<String>]) -> (Vec<String>, Vec<usize>) {
    let mut flat = Vec::new();
    let mut idx = Vec::new();
    let mut i = 0;
    for band in bands {
        flat.extend(band.iter().cloned());
        idx.push(i);
        i += band.len();
    }
    (flat, idx)
}

fn band_index(idx: &[usize], pos: f64) -> usize {
    for (iband, &i0) in idx.iter().enumerate().rev() {
        if pos >= i0 as f64 {
            return iband;
        }
    }
    idx.len()
}

/// Median of a sorted set of neighbour positions, using the weighted
/// midpoint formula for an even-sized set (matches the original's
/// tie-breaking towards the denser side). `-1.0` means "no neighbours".
fn median_value(positions: &[usize]) -> f64 {
    let n = positions.len();
    if n == 0 {
        return -1.0;
    }
    let m = n / 2;
    if n % 2 == 1 {
        positions[m] as f64
    } else if n == 2 {
        (positions[0] + positions[1]) as f64 / 2.0
    } else {
        let left = (positions[m - 1] - positions[0]) as f64;
        let right = (positions[n - 1] - positions[m]) as f64;
        (positions[m - 1] as f64 * right + positions[m] as f64 * left) / (left + right)
    }
}

fn neighbour_positions(graph: &ViewGraph, rank: &[String], u: &str) -> Vec<usize> {
    let mut positions: Vec<usize> = rank
        .iter()
        .enumerate()
        .filter(|(_, n)| graph.has_edge(n, u) || graph.has_edge(u, n))
        .map(|(i, _)| i)
        .collect();
    positions.sort_unstable();
    positions
}

/// Forward-fill (`side == Below`) or backward-fill (`side == Above`)
/// missing (`-1.0`) positions from their nearest known neighbour.
fn fill_unknown(values: &[f64], side: Side) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut y: Vec<f64> = values.to_vec();
    if side == Side::Above {
        y.reverse();
    }
    let mut a = if y[0] >= 0.0 {
        y[0]
    } else if side == Side::Above {
        y.len() as f64
    } else {
        0.0
    };
    let mut z = Vec::with_capacity(y.len());
    for &x in &y {
        if x >= 0.0 {
            a = x;
        }
        z.push(a);
    }
    if side == Side::Above {
        z.reverse();
    }
    z
}

/// Where a new node connected to `other_bands` should sit within
/// `this_bands`: the band index and the position within that band.
pub(crate) fn new_node_indices(
    graph: &ViewGraph,
    this_bands: &[Vec<String>],
    other_bands: &[Vec<String>],
    new_node: &str,
    side: Side,
) -> (usize, usize) {
    let (this_layer, _) = flatten_bands(this_bands);
    let (other_layer, other_idx) = flatten_bands(other_bands);

    let new_pos = median_value(&neighbour_positions(graph, &other_layer, new_node));
    if new_pos < 0.0 {
        return (0, 0);
    }
    let new_band = band_index(&other_idx, new_pos);

    let existing_pos: Vec<f64> = this_layer
        .iter()
        .map(|u| median_value(&neighbour_positions(graph, &other_layer, u)))
        .collect();
    let existing_pos = fill_unknown(&existing_pos, side);

    let candidates: Vec<f64> = this_layer
        .iter()
        .zip(existing_pos.iter())
        .filter(|(_, &pos)| band_index(&other_idx, pos) == new_band)
        .map(|(_, &pos)| pos)
        .collect();

    let index = match side {
        Side::Below => candidates.partition_point(|&p| p <= new_pos),
        Side::Above => candidates.partition_point(|&p| p < new_pos),
    };
    (new_band, index)
}

/// Insert dummy waypoint nodes for every rank strictly between `v` and
/// `w`'s current ranks, routing `bundle_id`'s edge through them, and
/// record the edge directly when `v`/`w` are already adjacent.
fn add_dummy_nodes(
    graph: &mut ViewGraph,
    ordering: &mut Ordering,
    definition: &SankeyDefinition,
    v: &str,
    w: &str,
    bundle_id: &str,
) -> CompileResult<()> {
    let (rv, iv, jv) = ordering
        .indices(v)
        .ok_or_else(|| CompileError::UnknownNode(v.to_string()))?;
    let (rw, _, _) = ordering
        .indices(w)
        .ok_or_else(|| CompileError::UnknownNode(w.to_string()))?;
    let v_dir = graph.direction(v, definition);
    let w_dir = graph.direction(w, definition);

    let (new_ranks, d): (Vec<i64>, Direction) = if rw > rv {
        let p = if v_dir == Direction::Left { rv as i64 } else { rv as i64 + 1 };
        let q = if w_dir == Direction::Left { rw as i64 } else { rw as i64 - 1 };
        ((p..=q).collect(), Direction::Right)
    } else if rv > rw {
        let p = if v_dir == Direction::Right { rv as i64 } else { rv as i64 - 1 };
        let q = if w_dir == Direction::Right { rw as i64 } else { rw as i64 + 1 };
        ((q..=p).rev().collect(), Direction::Left)
    } else {
        (Vec::new(), Direction::Right)
    };

    if new_ranks.is_empty() {
        graph.add_edge(v, w, bundle_id);
        graph.record_segment(bundle_id, Some(v), Some(w));
        return Ok(());
    }

    let mut u = v.to_string();
    for r in new_ranks {
        let idr = format!("__{v}_{w}_{r}");
        if graph.index.contains_key(&idr) {
            graph.add_edge(&u, &idr, bundle_id);
            graph.record_segment(bundle_id, Some(&u), Some(&idr));
        } else {
            graph.add_edge(&u, &idr, bundle_id);
            graph.record_segment(bundle_id, Some(&u), Some(&idr));
            let (i, j) = if r == rv as i64 {
                let j_shift: i64 = jv as i64 + if v_dir == Direction::Right { 1 } else { -1 };
                (iv, j_shift.max(0) as usize)
            } else {
                let num_bands = ordering.layers.get(0).map(|l| l.len()).unwrap_or(1);
                let this_layer_idx = ordering.ensure_layer(r, num_bands);
                let prev_layer_idx = if d == Direction::Left {
                    ordering.ensure_layer(r + 1, num_bands)
                } else {
                    ordering.ensure_layer(r - 1, num_bands)
                };
                new_node_indices(
                    graph,
                    &ordering.layers[this_layer_idx],
                    &ordering.layers[prev_layer_idx],
                    &idr,
                    if d == Direction::Left { Side::Below } else { Side::Above },
                )
            };
            let num_bands = ordering.layers.get(0).map(|l| l.len()).unwrap_or(1);
            let layer_idx = ordering.ensure_layer(r, num_bands);
            ordering.insert(layer_idx, i, j, idr.clone());
            graph.ensure_node(&idr);
            graph
                .dummy_waypoints
                .insert(idr.clone(), Waypoint { partition: None, direction: d, title: Some(String::new()) });
        }
        u = idr;
    }
    graph.add_edge(&u, w, bundle_id);
    graph.record_segment(bundle_id, Some(&u), Some(w));
    Ok(())
}

/// Placement helper for augmentation: where a new waypoint connected to
/// `other_bands` should sit within `this_bands`, always filling unknown
/// neighbour positions forward (the original's `side='below'` used for
/// both to- and from-Elsewhere waypoint placement).
pub fn new_node_indices_below(
    graph: &ViewGraph,
    this_bands: &[Vec<String>],
    other_bands: &[Vec<String>],
    new_node: &str,
) -> (usize, usize) {
    new_node_indices(graph, this_bands, other_bands, new_node, Side::Below)
}

/// Build the full layered view graph for a definition: every node placed,
/// every bundle's chain of segments connected (through dummy waypoints
/// where ranks are non-adjacent), widest-span bundles processed first so
/// later narrower bundles can share already-placed dummy nodes.
pub fn build_view_graph(definition: &SankeyDefinition) -> CompileResult<(ViewGraph, Ordering)> {
    let mut graph = ViewGraph::new();
    for id in definition.nodes.keys() {
        graph.ensure_node(id);
    }
    let mut ordering = definition.ordering.clone();

    let mut bundle_ids: Vec<&String> = definition.bundles.keys().collect();
    bundle_ids.sort_by_key(|id| {
        let bundle = &definition.bundles[*id];
        if bundle.to_elsewhere() || bundle.from_elsewhere() {
            i64::MAX
        } else {
            let rs = ordering.indices(bundle.source.as_node_id().unwrap_or("")).map(|(r, _, _)| r as i64);
            let rt = ordering.indices(bundle.target.as_node_id().unwrap_or("")).map(|(r, _, _)| r as i64);
            match (rs, rt) {
                (Some(rs), Some(rt)) => -(rt - rs).abs(),
                _ => 0,
            }
        }
    });

    for id in bundle_ids {
        let bundle = &definition.bundles[id];
        let mut chain: Vec<NodeRef> = vec![bundle.source.clone()];
        chain.extend(bundle.waypoints.iter().cloned().map(NodeRef::Node));
        chain.push(bundle.target.clone());

        for pair in chain.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.is_elsewhere() || b.is_elsewhere() {
                graph.record_segment(id, a.as_node_id(), b.as_node_id());
                continue;
            }
            add_dummy_nodes(
                &mut graph,
                &mut ordering,
                definition,
                a.as_node_id().unwrap(),
                b.as_node_id().unwrap(),
                id,
            )?;
        }
    }

    Ok((graph, ordering))
}
