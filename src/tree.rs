//! Decision tree: build from a rule set, evaluate against a row.
//!
//! A tree is either a [`Node::Leaf`] holding a payload, or a [`Node::Branch`]
//! keyed on an attribute name, mapping explicit values to subtrees and
//! falling back to a distinguished default subtree on miss.

use crate::constraint::{Constraint, Query, Value};
use crate::rules::Rules;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: serde::de::DeserializeOwned"
))]
pub enum Node<T> {
    Leaf {
        value: T,
    },
    Branch {
        attr: String,
        branches: BTreeMap<String, Node<T>>,
        default: Box<Node<T>>,
    },
}

impl<T> Node<T> {
    pub fn leaf(value: T) -> Self {
        Node::Leaf { value }
    }
}

/// Build a decision tree from `rules`.
///
/// - `attr_order`: explicit attribute branching order; defaults to the
///   sorted set of attributes constrained anywhere in `rules`.
/// - `combine_values`: how to combine the labels surviving at a leaf into
///   one payload. If absent, a leaf with zero labels takes `default_value`
///   and a leaf with exactly one label takes it directly; more than one
///   label with no combiner is a builder error (ambiguous rule set —
///   callers are expected to have already run [`Rules::refine`]).
pub fn build_tree<T: Clone>(
    rules: &Rules<T>,
    attr_order: Option<Vec<String>>,
    combine_values: Option<&dyn Fn(&[T]) -> T>,
    default_value: Option<T>,
) -> Node<T> {
    let attrs = attr_order.unwrap_or_else(|| rules.attrs().into_iter().collect());
    build(&rules.items, &attrs, combine_values, &default_value)
}

fn build<T: Clone>(
    items: &[(Query, T)],
    attrs: &[String],
    combine_values: Option<&dyn Fn(&[T]) -> T>,
    default_value: &Option<T>,
) -> Node<T> {
    let Some((attr, rest)) = attrs.split_first() else {
        let labels: Vec<T> = items.iter().map(|(_, l)| l.clone()).collect();
        let value = if let Some(combine) = combine_values {
            combine(&labels)
        } else {
            match labels.len() {
                0 => default_value
                    .clone()
                    .expect("build_tree: empty leaf with no default_value"),
                1 => labels[0].clone(),
                _ => panic!("build_tree: ambiguous leaf with no combine_values"),
            }
        };
        return Node::Leaf { value };
    };

    let all_values: std::collections::BTreeSet<Value> = items
        .iter()
        .filter_map(|(q, _)| q.get(attr))
        .flat_map(|c| c.explicit_values().iter().cloned())
        .collect();

    let mut by_value: BTreeMap<Value, Vec<(Query, T)>> =
        all_values.iter().map(|v| (v.clone(), Vec::new())).collect();
    let mut default_rules: Vec<(Query, T)> = Vec::new();

    for (q, label) in items {
        match q.get(attr) {
            None => {
                for v in &all_values {
                    by_value.get_mut(v).unwrap().push((q.clone(), label.clone()));
                }
                default_rules.push((q.clone(), label.clone()));
            }
            Some(Constraint::Includes(s)) => {
                for v in s {
                    if let Some(bucket) = by_value.get_mut(v) {
                        let mut q2 = q.clone();
                        q2.remove(attr);
                        bucket.push((q2, label.clone()));
                    }
                }
            }
            Some(Constraint::Excludes(s)) => {
                for v in &all_values {
                    if !s.contains(v) {
                        let mut q2 = q.clone();
                        q2.remove(attr);
                        by_value.get_mut(v).unwrap().push((q2, label.clone()));
                    }
                }
                let mut q2 = q.clone();
                q2.remove(attr);
                default_rules.push((q2, label.clone()));
            }
        }
    }

    if by_value.is_empty() {
        // No explicit values anywhere in the remaining rules: avoid a
        // trivial branch, emit only the default child.
        return build(&default_rules, rest, combine_values, default_value);
    }

    let branches: BTreeMap<String, Node<T>> = by_value
        .into_iter()
        .map(|(v, sub)| (v, build(&sub, rest, combine_values, default_value)))
        .collect();
    let default = build(&default_rules, rest, combine_values, default_value);

    Node::Branch {
        attr: attr.clone(),
        branches,
        default: Box::new(default),
    }
}

/// Evaluate `node` against a row, using `get_value(attr)` to fetch the
/// row's attribute values. On a branch whose attribute is missing from the
/// row, or whose value is not a key in `branches`, the default subtree is
/// taken.
pub fn evaluate<T: Clone>(node: &Node<T>, get_value: &dyn Fn(&str) -> Option<String>) -> T {
    match node {
        Node::Leaf { value } => value.clone(),
        Node::Branch {
            attr,
            branches,
            default,
        } => {
            if let Some(v) = get_value(attr) {
                if let Some(sub) = branches.get(&v) {
                    return evaluate(sub, get_value);
                }
            }
            evaluate(default, get_value)
        }
    }
}
