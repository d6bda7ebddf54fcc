//! Partition router: expands one partition declaration into rules covering
//! explicit groups and the catch-all, and assembles per-segment routing
//! rules keyed on [`EdgeKey`].

use crate::constraint::Query;
use crate::error::{CompileError, CompileResult};
use crate::partition::Partition;
use crate::rules::Rules;
use serde::{Deserialize, Serialize};

/// Which endpoint of a segment a partition's `process`/`process.X`
/// pseudo-attribute refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSide {
    Source,
    Target,
}

fn translate_attr(attr: &str, process_side: Option<ProcessSide>) -> String {
    if attr == "process" || attr.starts_with("process.") {
        let side = process_side.expect("must specify process_side for attr \"process\"");
        let suffix = &attr[7..]; // "process".len() == 7
        let base = match side {
            ProcessSide::Source => "source",
            ProcessSide::Target => "target",
        };
        format!("{base}{suffix}")
    } else {
        attr.to_string()
    }
}

/// Expand a partition declaration into rules labelled with the resolved
/// group name (prefixed) or the catch-all. `None` labels mark the
/// "no label at all" case used when `label_prefix` itself is `None` (an
/// Elsewhere endpoint).
pub fn expand_partition(
    partition: Option<&Partition>,
    label_prefix: Option<&str>,
    default_label: &str,
    process_side: Option<ProcessSide>,
) -> CompileResult<Rules<Option<String>>> {
    let base: Rules<String> = match partition {
        None => Rules::single("*".to_string()),
        Some(p) => Rules::new(
            p.groups
                .iter()
                .map(|g| {
                    let mut q = Query::new();
                    for (attr, constraint) in &g.query {
                        q.insert(translate_attr(attr, process_side), constraint.clone());
                    }
                    (q, g.label.clone())
                })
                .collect(),
        ),
    };

    let refined = base.refine();
    let mut items = Vec::with_capacity(refined.items.len());
    for (q, labels) in refined.items {
        let resolved = match labels.len() {
            0 => Some(format!("{}{}", label_prefix.unwrap_or(""), default_label)),
            1 => label_prefix.map(|p| format!("{p}{}", labels[0])),
            _ => return Err(CompileError::OverlappingPartitionGroups(labels.join(", "))),
        };
        items.push((q, resolved));
    }
    Ok(Rules::new(items))
}

/// The identity of one drawn visual edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: Option<String>,
    pub target: Option<String>,
    pub material: String,
    pub time: String,
}

/// Build routing rules for one segment: expand each of the four partitions
/// and combine by n-ary product into [`EdgeKey`]s.
pub fn build_segment_routing(
    source_node: Option<&str>,
    target_node: Option<&str>,
    source_partition: Option<&Partition>,
    target_partition: Option<&Partition>,
    material_partition: Option<&Partition>,
    time_partition: Option<&Partition>,
) -> CompileResult<Rules<EdgeKey>> {
    let source_prefix = source_node.map(|n| format!("{n}^"));
    let target_prefix = target_node.map(|n| format!("{n}^"));

    let source_rules = expand_partition(
        source_partition,
        source_prefix.as_deref(),
        "_",
        Some(ProcessSide::Source),
    )?;
    let target_rules = expand_partition(
        target_partition,
        target_prefix.as_deref(),
        "_",
        Some(ProcessSide::Target),
    )?;
    let material_rules = expand_partition(material_partition, Some(""), "_", None)?;
    let time_rules = expand_partition(time_partition, Some(""), "_", None)?;

    let rule_sets = [source_rules, target_rules, material_rules, time_rules];
    Ok(Rules::expand_product_all(&rule_sets, |labels| EdgeKey {
        source: labels[0].clone(),
        target: labels[1].clone(),
        material: labels[2].clone().unwrap_or_default(),
        time: labels[3].clone().unwrap_or_default(),
    }))
}

/// Merge a bundle's chain of segments: a row flowing through this bundle
/// touches one edge per segment, and merging gives their coordinated
/// labels so a row falls into a globally consistent bucket across the
/// whole chain.
pub fn merge_segment_routings(segments: &[Rules<EdgeKey>]) -> Rules<Vec<EdgeKey>> {
    Rules::expand_product_all(segments, |edges: &[EdgeKey]| edges.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_partition_none_yields_wildcard() {
        let rules = expand_partition(None, Some("a^"), "_", None).unwrap();
        assert_eq!(rules.items.len(), 1);
        assert_eq!(rules.items[0].1, Some("a^*".to_string()));
    }

    #[test]
    fn expand_partition_none_prefix_yields_none_label() {
        let rules = expand_partition(None, None, "_", None).unwrap();
        assert_eq!(rules.items[0].1, None);
    }

    #[test]
    fn expand_partition_builds_catch_all() {
        let partition = Partition::simple("material", &["m", "n"]).unwrap();
        let rules = expand_partition(Some(&partition), Some("via^"), "_", None).unwrap();
        let labels: Vec<_> = rules.items.iter().map(|(_, l)| l.clone()).collect();
        assert!(labels.contains(&Some("via^m".to_string())));
        assert!(labels.contains(&Some("via^n".to_string())));
        assert!(labels.contains(&Some("via^_".to_string())));
    }

    #[test]
    fn expand_partition_overlap_errors() {
        let overlapping = Partition::new(vec![
            crate::partition::Group::new(
                "x",
                Query::from([(
                    "material".to_string(),
                    crate::constraint::Constraint::includes(["1".to_string(), "2".to_string()]),
                )]),
            ),
            crate::partition::Group::new(
                "y",
                Query::from([(
                    "material".to_string(),
                    crate::constraint::Constraint::includes(["2".to_string(), "3".to_string()]),
                )]),
            ),
        ]);
        let err = expand_partition(Some(&overlapping), Some(""), "_", None).unwrap_err();
        assert!(matches!(err, CompileError::OverlappingPartitionGroups(_)));
    }

    #[test]
    fn build_segment_routing_two_plain_nodes() {
        let rules = build_segment_routing(Some("a"), Some("b"), None, None, None, None).unwrap();
        assert_eq!(rules.items.len(), 1);
        let edge = &rules.items[0].1;
        assert_eq!(edge.source.as_deref(), Some("a^*"));
        assert_eq!(edge.target.as_deref(), Some("b^*"));
        assert_eq!(edge.material, "_");
        assert_eq!(edge.time, "_");
    }

    #[test]
    fn build_segment_routing_elsewhere_source() {
        let rules = build_segment_routing(None, Some("b"), None, None, None, None).unwrap();
        let edge = &rules.items[0].1;
        assert_eq!(edge.source, None);
        assert_eq!(edge.target.as_deref(), Some("b^*"));
    }
}
