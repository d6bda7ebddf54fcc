//! Typed tabular data: the flow dataset the executor streams, and the
//! process dimension table query-string selections are evaluated against.
//!
//! Grounded on `examples/original_source/sankeyview/dataset.py`'s `Dataset`
//! abstraction, adapted from pandas DataFrames to owned rows of typed
//! columns (see SPEC_FULL.md s10, row iteration contract: the tree's
//! evaluator only needs `get_value(row, attr) -> Option<String>`, so numeric
//! and string columns are both stringified consistently).

use std::collections::BTreeMap;

/// One cell value. Numeric cells participate in measure aggregation;
/// both kinds stringify consistently for attribute matching.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
}

impl Value {
    pub fn as_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.parse().ok(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

/// A row-of-maps flow table. Each row must carry `source` and `target`
/// string attributes plus whatever columns partitions or measures
/// reference (s6).
#[derive(Debug, Clone, Default)]
pub struct FlowTable {
    pub rows: Vec<BTreeMap<String, Value>>,
}

impl FlowTable {
    pub fn new(rows: Vec<BTreeMap<String, Value>>) -> Self {
        FlowTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stringified attribute value for row `idx`. Used by the routing
    /// tree's `get_value` callback.
    pub fn get_value(&self, idx: usize, attr: &str) -> Option<String> {
        self.rows[idx].get(attr).map(Value::as_display_string)
    }

    /// Numeric value for row `idx`, for measure aggregation. `None` when
    /// the column is absent from this row or unparseable as a number.
    pub fn get_measure(&self, idx: usize, column: &str) -> Option<f64> {
        self.rows[idx].get(column).and_then(Value::as_f64)
    }
}

/// A process dimension table, keyed by process id, used to evaluate
/// query-string `ProcessGroup` selections (s9 design note, option (a)).
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    pub rows: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ProcessTable {
    pub fn new(rows: BTreeMap<String, BTreeMap<String, Value>>) -> Self {
        ProcessTable { rows }
    }

    /// Process ids whose row satisfies `predicate` under
    /// [`crate::query_lang`] evaluation.
    pub fn matching_ids(&self, predicate: &crate::query_lang::Predicate) -> Vec<String> {
        let mut out: Vec<String> = self
            .rows
            .iter()
            .filter(|(_, row)| {
                let stringified: BTreeMap<&str, String> = row
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_display_string()))
                    .collect();
                crate::query_lang::evaluate(predicate, &|attr| {
                    stringified.get(attr).map(String::as_str)
                })
            })
            .map(|(id, _)| id.clone())
            .collect();
        out.sort();
        out
    }
}
