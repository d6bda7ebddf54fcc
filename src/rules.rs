//! Rule sets: an unordered collection of `(Query, label)` pairs and the
//! operations that combine and refine them.
//!
//! The central operation is [`Rules::refine`], which turns an arbitrary,
//! possibly-overlapping collection of rules into a disjoint cover: every
//! region of attribute space is represented by exactly one output rule,
//! labelled with the ordered tuple of every input rule that matched there.

use crate::constraint::{intersect_queries, is_satisfiable, Constraint, Query, Value};
use std::collections::BTreeSet;

/// An unordered collection of `(Query, label)` pairs.
///
/// The intended semantics of a rule set is the partial function "for each
/// row, collect the labels of every matching rule". A rule set is
/// deterministic when no row matches more than one rule — [`Rules::refine`]
/// produces exactly such a set.
#[derive(Debug, Clone)]
pub struct Rules<T> {
    pub items: Vec<(Query, T)>,
}

impl<T> Rules<T> {
    pub fn new(items: Vec<(Query, T)>) -> Self {
        Rules { items }
    }

    pub fn empty() -> Self {
        Rules { items: Vec::new() }
    }

    pub fn single(label: T) -> Self {
        Rules {
            items: vec![(Query::new(), label)],
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Union of every attribute constrained by any rule, in sorted order.
    pub fn attrs(&self) -> BTreeSet<String> {
        self.items
            .iter()
            .flat_map(|(q, _)| q.keys().cloned())
            .collect()
    }

    /// Union of the explicit value sets constraining `attr` across every
    /// rule (both `Includes` and `Excludes` contribute their values).
    pub fn query_values(&self, attr: &str) -> BTreeSet<Value> {
        self.items
            .iter()
            .filter_map(|(q, _)| q.get(attr))
            .flat_map(|c| c.explicit_values().iter().cloned())
            .collect()
    }
}

impl<T: Clone> Rules<T> {
    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> Rules<U> {
        Rules {
            items: self.items.iter().map(|(q, l)| (q.clone(), f(l))).collect(),
        }
    }

    pub fn filter<P: Fn(&T) -> bool>(&self, p: P) -> Rules<T> {
        Rules {
            items: self
                .items
                .iter()
                .filter(|(_, l)| p(l))
                .cloned()
                .collect(),
        }
    }

    /// For each rule, call `f(label)` producing a secondary rule set;
    /// intersect each of its queries with the outer query and drop
    /// unsatisfiable results.
    pub fn expand<U: Clone, F: Fn(&T) -> Rules<U>>(&self, f: F) -> Rules<U> {
        let mut out = Vec::new();
        for (q, label) in &self.items {
            let inner = f(label);
            for (q2, label2) in inner.items {
                let merged = intersect_queries(q, &q2);
                if is_satisfiable(&merged) {
                    out.push((merged, label2));
                }
            }
        }
        Rules { items: out }
    }

    /// Full Cartesian product with `other`, combining labels via `combine`.
    /// Equivalent to `expand(|t| other.map(|u| combine(t, u)))`.
    pub fn expand_product<U, V, F>(&self, other: &Rules<U>, combine: F) -> Rules<V>
    where
        U: Clone,
        V: Clone,
        F: Fn(&T, &U) -> V,
    {
        self.expand(|t| other.map(|u| combine(t, u)))
    }

    /// n-ary product over `rule_sets`, accumulated left to right, with a
    /// final `combine` over the slice of per-set labels.
    pub fn expand_product_all<V, F>(rule_sets: &[Rules<T>], combine: F) -> Rules<V>
    where
        V: Clone,
        F: Fn(&[T]) -> V,
    {
        let mut acc: Rules<Vec<T>> = Rules::single(Vec::new());
        for rs in rule_sets {
            acc = acc.expand_product(rs, |prefix: &Vec<T>, item: &T| {
                let mut v = prefix.clone();
                v.push(item.clone());
                v
            });
        }
        acc.map(|v| combine(v))
    }

    /// The common refinement of this rule set: a new, disjoint rule set
    /// covering every region any input rule covered, each region labelled
    /// with the ordered tuple of every input label that matched it.
    ///
    /// Enumerates attributes in sorted order; for each attribute, splits
    /// the current rule set by every explicit value mentioned plus one
    /// catch-all "excludes everything explicit" default region, and
    /// recurses. Bounded by Π(distinct explicit values per attribute + 1).
    pub fn refine(&self) -> Rules<Vec<T>> {
        let attrs: Vec<String> = self.attrs().into_iter().collect();
        let regions = compute_regions(self.items.clone(), &attrs);
        Rules { items: regions }
    }
}

fn explicit_values_for_attr<T>(rules: &[(Query, T)], attr: &str) -> BTreeSet<Value> {
    rules
        .iter()
        .filter_map(|(q, _)| q.get(attr))
        .flat_map(|c| c.explicit_values().iter().cloned())
        .collect()
}

fn restrict_to_value<T: Clone>(rules: &[(Query, T)], attr: &str, val: &str) -> Vec<(Query, T)> {
    rules
        .iter()
        .filter_map(|(q, label)| match q.get(attr) {
            None => Some((q.clone(), label.clone())),
            Some(Constraint::Includes(s)) => {
                if s.contains(val) {
                    let mut q2 = q.clone();
                    q2.remove(attr);
                    Some((q2, label.clone()))
                } else {
                    None
                }
            }
            Some(Constraint::Excludes(s)) => {
                if !s.contains(val) {
                    let mut q2 = q.clone();
                    q2.remove(attr);
                    Some((q2, label.clone()))
                } else {
                    None
                }
            }
        })
        .collect()
}

fn restrict_to_default<T: Clone>(
    rules: &[(Query, T)],
    attr: &str,
    explicit: &BTreeSet<Value>,
) -> Vec<(Query, T)> {
    rules
        .iter()
        .filter_map(|(q, label)| match q.get(attr) {
            None => Some((q.clone(), label.clone())),
            Some(Constraint::Excludes(s)) if s.is_subset(explicit) => {
                let mut q2 = q.clone();
                q2.remove(attr);
                Some((q2, label.clone()))
            }
            _ => None,
        })
        .collect()
}

fn compute_regions<T: Clone>(rules: Vec<(Query, T)>, attrs: &[String]) -> Vec<(Query, Vec<T>)> {
    let Some((attr, rest)) = attrs.split_first() else {
        return vec![(Query::new(), rules.into_iter().map(|(_, l)| l).collect())];
    };

    let explicit = explicit_values_for_attr(&rules, attr);
    let mut results = Vec::new();

    for val in &explicit {
        let sub_rules = restrict_to_value(&rules, attr, val);
        for (mut q, labels) in compute_regions(sub_rules, rest) {
            q.insert(attr.clone(), Constraint::includes([val.clone()]));
            results.push((q, labels));
        }
    }

    let sub_rules = restrict_to_default(&rules, attr, &explicit);
    for (mut q, labels) in compute_regions(sub_rules, rest) {
        if !explicit.is_empty() {
            q.insert(attr.clone(), Constraint::Excludes(explicit.clone()));
        }
        results.push((q, labels));
    }

    results
}
