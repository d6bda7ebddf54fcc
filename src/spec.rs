//! The compiled wire format: a `WeaverSpec` is a fully expanded diagram —
//! selections and partitions already resolved into a routing tree — that
//! the executor can stream flow data through without re-reading the
//! original definition.
//!
//! Grounded on `examples/original_source/src/floweaver/compiler/spec.py`.
//! Field renames (`attribute` -> `"attr"` in the two color specs) are
//! preserved via `#[serde(rename)]` so this crate's JSON is readable by
//! anything built against the original wire format.

use crate::combined_router::RoutingTree;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureSpec {
    pub column: String,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeDirection {
    R,
    L,
}

impl From<crate::sankey_definition::Direction> for NodeDirection {
    fn from(d: crate::sankey_definition::Direction) -> Self {
        match d {
            crate::sankey_definition::Direction::Right => NodeDirection::R,
            crate::sankey_definition::Direction::Left => NodeDirection::L,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSpecType {
    Process,
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: NodeSpecType,
    pub group: Option<String>,
    pub style: String,
    pub direction: NodeDirection,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: String,
    pub title: String,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleSpec {
    pub id: String,
    /// Process group id, or `"Elsewhere"`.
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// `None` means "from Elsewhere".
    pub source: Option<String>,
    /// `None` means "to Elsewhere".
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub material: String,
    pub time: String,
    pub bundle_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColorSpec {
    #[serde(rename = "type")]
    pub kind: CategoricalMarker,
    #[serde(rename = "attr")]
    pub attribute: String,
    pub lookup: std::collections::BTreeMap<String, String>,
    pub default: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoricalMarker {
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeColorSpec {
    #[serde(rename = "type")]
    pub kind: QuantitativeMarker,
    #[serde(rename = "attr")]
    pub attribute: String,
    pub palette: Vec<String>,
    pub domain: (f64, f64),
    #[serde(default)]
    pub intensity: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantitativeMarker {
    Quantitative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Quantitative(QuantitativeColorSpec),
    Categorical(CategoricalColorSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySpec {
    pub link_width: String,
    pub link_color: ColorSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaverSpec {
    pub version: String,
    pub nodes: std::collections::BTreeMap<String, NodeSpec>,
    pub groups: Vec<GroupSpec>,
    pub bundles: Vec<BundleSpec>,
    pub ordering: Vec<Vec<Vec<String>>>,
    pub edges: Vec<EdgeSpec>,
    pub measures: Vec<MeasureSpec>,
    pub display: DisplaySpec,
    pub routing_tree: RoutingTree,
}

pub const SPEC_VERSION: &str = "2.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorical_color_spec_renames_attribute_to_attr() {
        let spec = CategoricalColorSpec {
            kind: CategoricalMarker::Categorical,
            attribute: "type".to_string(),
            lookup: std::collections::BTreeMap::from([("steel".to_string(), "#ff0000".to_string())]),
            default: "#cccccc".to_string(),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["attr"], "type");
        assert!(json.get("attribute").is_none());
    }

    #[test]
    fn node_spec_direction_round_trips() {
        let spec = NodeSpec {
            title: "a".to_string(),
            node_type: NodeSpecType::Process,
            group: None,
            style: "default".to_string(),
            direction: NodeDirection::R,
            hidden: false,
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: NodeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
