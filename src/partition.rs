//! Partitions: an ordered sequence of user-visible groups, each a label
//! plus a conjunctive query. See the original specification s3.

use crate::constraint::{intersect_queries, Constraint, Query};
use crate::error::{CompileError, CompileResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One labelled group of a [`Partition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub label: String,
    pub query: Query,
}

impl Group {
    pub fn new(label: impl Into<String>, query: Query) -> Self {
        Group {
            label: label.into(),
            query,
        }
    }
}

/// An ordered sequence of groups. The compiler always augments a partition
/// with an implicit catch-all for rows matching no explicit group (handled
/// by the partition router, not stored here).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partition {
    pub groups: Vec<Group>,
}

impl Partition {
    pub fn new(groups: Vec<Group>) -> Self {
        Partition { groups }
    }

    pub fn labels(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.label.clone()).collect()
    }

    /// One group per distinct value of `dimension`, labelled with the value
    /// itself. Fails if the same value is requested for two groups.
    pub fn simple(dimension: &str, values: &[impl AsRef<str>]) -> CompileResult<Self> {
        let mut seen = BTreeSet::new();
        let mut groups = Vec::with_capacity(values.len());
        for v in values {
            let v = v.as_ref().to_string();
            if !seen.insert(v.clone()) {
                return Err(CompileError::DuplicatePartitionValue(v));
            }
            let mut q = Query::new();
            q.insert(dimension.to_string(), Constraint::includes([v.clone()]));
            groups.push(Group::new(v, q));
        }
        Ok(Partition::new(groups))
    }
}

/// Concatenation: lists groups of `self` then `other`.
impl std::ops::Add for Partition {
    type Output = Partition;
    fn add(self, other: Partition) -> Partition {
        let mut groups = self.groups;
        groups.extend(other.groups);
        Partition::new(groups)
    }
}

/// Cartesian product: cross-labelled groups whose queries are the
/// conjunction of both sides' queries.
impl std::ops::Mul for Partition {
    type Output = Partition;
    fn mul(self, other: Partition) -> Partition {
        let mut groups = Vec::with_capacity(self.groups.len() * other.groups.len());
        for g1 in &self.groups {
            for g2 in &other.groups {
                let label = format!("{}/{}", g1.label, g2.label);
                let query = intersect_queries(&g1.query, &g2.query);
                groups.push(Group::new(label, query));
            }
        }
        Partition::new(groups)
    }
}
