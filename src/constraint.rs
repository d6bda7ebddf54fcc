//! Constraint and Query algebra.
//!
//! A [`Constraint`] is a symbolic statement about the value of a single
//! attribute on a data row: either "the value is one of these" ([`Constraint::Includes`])
//! or "the value is anything but these" ([`Constraint::Excludes`]). Constraints
//! are never materialised against a concrete universe of values — `Excludes`
//! always carries its finite exclusion set rather than an implied infinite
//! inclusion set.
//!
//! A [`Query`] is a conjunction of constraints over named attributes; an
//! attribute missing from the map is vacuously true.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The value type rule sets are constrained over. Attribute values are
/// always compared and serialised as strings (see SPEC_FULL.md s10, row
/// iteration contract): numeric and categorical partition values are
/// stringified consistently on both the rule-building and row-access side.
pub type Value = String;

/// A set of accepted or rejected values for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// Matches a row whose value for this attribute is in the set.
    Includes(BTreeSet<Value>),
    /// Matches a row whose value for this attribute is *not* in the set.
    Excludes(BTreeSet<Value>),
}

impl Constraint {
    pub fn includes<I: IntoIterator<Item = Value>>(values: I) -> Self {
        Constraint::Includes(values.into_iter().collect())
    }

    pub fn excludes<I: IntoIterator<Item = Value>>(values: I) -> Self {
        Constraint::Excludes(values.into_iter().collect())
    }

    /// `Excludes(empty)`: vacuously true, matches every value.
    pub fn any() -> Self {
        Constraint::Excludes(BTreeSet::new())
    }

    /// `Includes(empty)`: unsatisfiable, matches nothing.
    pub fn none() -> Self {
        Constraint::Includes(BTreeSet::new())
    }

    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Constraint::Includes(s) if s.is_empty())
    }

    /// The set of values explicitly named by this constraint, regardless of
    /// polarity. Used by tree building and the partition router to enumerate
    /// "the explicit values mentioned for this attribute".
    pub fn explicit_values(&self) -> &BTreeSet<Value> {
        match self {
            Constraint::Includes(s) | Constraint::Excludes(s) => s,
        }
    }

    /// Does this constraint match `value`?
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Constraint::Includes(s) => s.contains(value),
            Constraint::Excludes(s) => !s.contains(value),
        }
    }
}

/// Intersect two constraints on the same attribute, producing the
/// constraint accepting exactly the rows accepted by both.
pub fn intersect_constraints(a: &Constraint, b: &Constraint) -> Constraint {
    match (a, b) {
        (Constraint::Includes(a), Constraint::Includes(b)) => {
            Constraint::Includes(a.intersection(b).cloned().collect())
        }
        (Constraint::Includes(a), Constraint::Excludes(b))
        | (Constraint::Excludes(b), Constraint::Includes(a)) => {
            Constraint::Includes(a.difference(b).cloned().collect())
        }
        (Constraint::Excludes(a), Constraint::Excludes(b)) => {
            Constraint::Excludes(a.union(b).cloned().collect())
        }
    }
}

/// A conjunctive mapping from attribute name to constraint. Missing
/// attributes are vacuous true.
pub type Query = BTreeMap<String, Constraint>;

/// Pointwise intersection of two queries. Attributes present on only one
/// side are carried through unchanged.
pub fn intersect_queries(a: &Query, b: &Query) -> Query {
    let mut out = a.clone();
    for (attr, c2) in b {
        match out.get(attr) {
            Some(c1) => {
                let merged = intersect_constraints(c1, c2);
                out.insert(attr.clone(), merged);
            }
            None => {
                out.insert(attr.clone(), c2.clone());
            }
        }
    }
    out
}

/// False iff any `Includes` constraint in the query has an empty value set.
pub fn is_satisfiable(q: &Query) -> bool {
    !q.values().any(Constraint::is_unsatisfiable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incl(values: &[&str]) -> Constraint {
        Constraint::includes(values.iter().map(|s| s.to_string()))
    }

    fn excl(values: &[&str]) -> Constraint {
        Constraint::excludes(values.iter().map(|s| s.to_string()))
    }

    #[test]
    fn includes_intersect_includes() {
        let a = incl(&["x", "y", "z"]);
        let b = incl(&["y", "z", "w"]);
        assert_eq!(intersect_constraints(&a, &b), incl(&["y", "z"]));
    }

    #[test]
    fn includes_intersect_excludes() {
        let a = incl(&["x", "y", "z"]);
        let b = excl(&["y"]);
        assert_eq!(intersect_constraints(&a, &b), incl(&["x", "z"]));
        assert_eq!(intersect_constraints(&b, &a), incl(&["x", "z"]));
    }

    #[test]
    fn excludes_intersect_excludes() {
        let a = excl(&["x"]);
        let b = excl(&["y"]);
        assert_eq!(intersect_constraints(&a, &b), excl(&["x", "y"]));
    }

    #[test]
    fn any_is_vacuous() {
        let a = Constraint::any();
        assert!(a.matches("anything"));
    }

    #[test]
    fn none_is_unsatisfiable() {
        assert!(Constraint::none().is_unsatisfiable());
        assert!(!is_satisfiable(&Query::from([(
            "x".to_string(),
            Constraint::none()
        )])));
    }

    #[test]
    fn query_intersection_carries_through_unshared_attrs() {
        let mut a = Query::new();
        a.insert("material".to_string(), incl(&["m"]));
        let mut b = Query::new();
        b.insert("time".to_string(), incl(&["2020"]));
        let merged = intersect_queries(&a, &b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["material"], incl(&["m"]));
        assert_eq!(merged["time"], incl(&["2020"]));
    }
}
