//! The diagram definition data model: process groups, waypoints, bundles,
//! ordering, and their construction-time validation.

use crate::error::{CompileError, CompileResult};
use crate::partition::Partition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display direction: left-to-right or right-to-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Right
    }
}

impl Direction {
    pub fn rank_step(self) -> i64 {
        match self {
            Direction::Right => 1,
            Direction::Left => -1,
        }
    }
}

/// How a process group's member processes are selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// An explicit set of process ids.
    Ids(Vec<String>),
    /// A predicate query string, evaluated against a process dimension
    /// table.
    Query(String),
}

/// A named source of processes, optionally split by a partition into
/// visible sub-nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessGroup {
    pub selection: Option<Selection>,
    pub partition: Option<Partition>,
    pub direction: Direction,
    pub title: Option<String>,
}

/// A routing stop with no intrinsic selection; may carry a partition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Waypoint {
    pub partition: Option<Partition>,
    pub direction: Direction,
    pub title: Option<String>,
}

/// A node in the diagram definition: either a process group (has a
/// selection) or a waypoint (routing stop only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ProcessGroup(ProcessGroup),
    Waypoint(Waypoint),
}

impl NodeKind {
    pub fn direction(&self) -> Direction {
        match self {
            NodeKind::ProcessGroup(p) => p.direction,
            NodeKind::Waypoint(w) => w.direction,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            NodeKind::ProcessGroup(p) => p.title.as_deref(),
            NodeKind::Waypoint(w) => w.title.as_deref(),
        }
    }

    pub fn partition(&self) -> Option<&Partition> {
        match self {
            NodeKind::ProcessGroup(p) => p.partition.as_ref(),
            NodeKind::Waypoint(w) => w.partition.as_ref(),
        }
    }

    pub fn is_process_group(&self) -> bool {
        matches!(self, NodeKind::ProcessGroup(_))
    }
}

/// A bundle endpoint: a concrete node, or the Elsewhere sentinel meaning
/// "any process not explicitly modelled on that side".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRef {
    Node(String),
    Elsewhere,
}

impl NodeRef {
    pub fn as_node_id(&self) -> Option<&str> {
        match self {
            NodeRef::Node(id) => Some(id),
            NodeRef::Elsewhere => None,
        }
    }

    pub fn is_elsewhere(&self) -> bool {
        matches!(self, NodeRef::Elsewhere)
    }
}

/// A directed connection from one process group to another, optionally via
/// an ordered list of waypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub source: NodeRef,
    pub target: NodeRef,
    #[serde(default)]
    pub waypoints: Vec<String>,
    #[serde(default)]
    pub flow_selection: Option<String>,
    #[serde(default)]
    pub flow_partition: Option<Partition>,
    #[serde(default)]
    pub default_partition: Option<Partition>,
}

impl Bundle {
    pub fn new(source: NodeRef, target: NodeRef) -> Self {
        Bundle {
            source,
            target,
            waypoints: Vec::new(),
            flow_selection: None,
            flow_partition: None,
            default_partition: None,
        }
    }

    pub fn to_elsewhere(&self) -> bool {
        self.target.is_elsewhere()
    }

    pub fn from_elsewhere(&self) -> bool {
        self.source.is_elsewhere()
    }
}

/// Three-level nested sequence: layers of bands of ordered node ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ordering {
    pub layers: Vec<Vec<Vec<String>>>,
}

impl Ordering {
    pub fn new(layers: Vec<Vec<Vec<String>>>) -> Self {
        Ordering { layers }
    }

    /// Single-band shorthand: each layer is just a flat list of node ids.
    pub fn single_band(layers: Vec<Vec<String>>) -> Self {
        Ordering {
            layers: layers.into_iter().map(|nodes| vec![nodes]).collect(),
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Locate `id`, returning (layer, band, index-within-band).
    pub fn indices(&self, id: &str) -> Option<(usize, usize, usize)> {
        for (r, bands) in self.layers.iter().enumerate() {
            for (b, band) in bands.iter().enumerate() {
                if let Some(i) = band.iter().position(|n| n == id) {
                    return Some((r, b, i));
                }
            }
        }
        None
    }

    pub fn insert(&mut self, layer: usize, band: usize, index: usize, id: String) {
        self.layers[layer][band].insert(index, id);
    }

    /// Ensure `layer` (which may be one past the end, or negative-shifted
    /// to before the start) exists, growing with empty bands matching the
    /// existing band count. Returns the possibly-shifted layer index.
    pub fn ensure_layer(&mut self, layer: i64, num_bands: usize) -> usize {
        if layer < 0 {
            let empty_layer = vec![Vec::new(); num_bands.max(1)];
            self.layers.insert(0, empty_layer);
            0
        } else if (layer as usize) >= self.layers.len() {
            let empty_layer = vec![Vec::new(); num_bands.max(1)];
            self.layers.push(empty_layer);
            self.layers.len() - 1
        } else {
            layer as usize
        }
    }
}

/// Tuple (nodes-by-id, bundles-by-id, ordering, optional global flow
/// selection, optional global flow partition, optional time partition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SankeyDefinition {
    pub nodes: BTreeMap<String, NodeKind>,
    pub bundles: BTreeMap<String, Bundle>,
    pub ordering: Ordering,
    #[serde(default)]
    pub flow_selection: Option<String>,
    #[serde(default)]
    pub flow_partition: Option<Partition>,
    #[serde(default)]
    pub time_partition: Option<Partition>,
}

impl SankeyDefinition {
    pub fn new(
        nodes: BTreeMap<String, NodeKind>,
        bundles: BTreeMap<String, Bundle>,
        ordering: Ordering,
    ) -> Self {
        SankeyDefinition {
            nodes,
            bundles,
            ordering,
            flow_selection: None,
            flow_partition: None,
            time_partition: None,
        }
    }

    /// Validate bundle endpoints/waypoints and ordering entries reference
    /// existing nodes of the right kind (original specification s7:
    /// Unknown reference, Wrong node kind).
    pub fn validate(&self) -> CompileResult<()> {
        for (id, bundle) in &self.bundles {
            if let NodeRef::Node(src) = &bundle.source {
                match self.nodes.get(src) {
                    None => return Err(CompileError::UnknownNode(src.clone())),
                    Some(NodeKind::Waypoint(_)) => {
                        return Err(CompileError::WrongNodeKind(
                            src.clone(),
                            "expected process group, found waypoint",
                        ))
                    }
                    Some(NodeKind::ProcessGroup(_)) => {}
                }
            }
            if let NodeRef::Node(tgt) = &bundle.target {
                match self.nodes.get(tgt) {
                    None => return Err(CompileError::UnknownNode(tgt.clone())),
                    Some(NodeKind::Waypoint(_)) => {
                        return Err(CompileError::WrongNodeKind(
                            tgt.clone(),
                            "expected process group, found waypoint",
                        ))
                    }
                    Some(NodeKind::ProcessGroup(_)) => {}
                }
            }
            if bundle.source.is_elsewhere() && bundle.target.is_elsewhere() {
                return Err(CompileError::ElsewhereToElsewhere);
            }
            for wp in &bundle.waypoints {
                match self.nodes.get(wp) {
                    None => return Err(CompileError::UnknownNode(wp.clone())),
                    Some(NodeKind::ProcessGroup(_)) => {
                        return Err(CompileError::WrongNodeKind(
                            wp.clone(),
                            "expected waypoint, found process group",
                        ))
                    }
                    Some(NodeKind::Waypoint(_)) => {}
                }
            }
            let _ = id;
        }

        for bands in &self.ordering.layers {
            for band in bands {
                for id in band {
                    if !self.nodes.contains_key(id) {
                        return Err(CompileError::UnknownNode(id.clone()));
                    }
                }
            }
        }

        Ok(())
    }
}
