//! # Weaver: a Sankey diagram compiler
//!
//! Compiles a declarative diagram definition — named process groups,
//! waypoints, bundles connecting them, an explicit node partition and
//! layer ordering — into a frozen [`spec::WeaverSpec`]: a decision tree
//! that routes flow rows to the diagram's edges, plus the node, group,
//! ordering, and color metadata a renderer needs. A separate executor
//! streams a flow table through that tree and produces the final
//! [`executor::SankeyData`].
//!
//! ## Pipeline
//!
//! ```text
//! SankeyDefinition
//!     |
//! [view_graph]        -> layered DAG + ordering (process groups, waypoints)
//!     |
//! [augment]            -> + implicit Elsewhere waypoints/bundles
//!     |
//! [selection_router]    -> per-bundle selection rules (ids or query strings)
//! [partition_router]     -> per-segment partition-label rules
//! [combined_router]    -> merged rule set -> deduped EdgeKeys -> RoutingTree
//!     |
//! [compile]            -> WeaverSpec (nodes, groups, ordering, display, tree)
//!     |
//! [executor]            -> SankeyData (given a FlowTable of rows to route)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weaver::compile::{compile_sankey_definition, CompileOptions};
//! use weaver::executor::execute_weave;
//!
//! let spec = compile_sankey_definition(&definition, CompileOptions::default(), None)?;
//! let data = execute_weave(&spec, &flow_table);
//! ```
//!
//! ## Module organization
//!
//! | Module | Role |
//! |---|---|
//! | `sankey_definition` | Diagram definition data model, construction-time validation |
//! | `partition`, `constraint`, `query_lang`, `rules` | Constraint/query algebra and rule-set refinement |
//! | `view_graph` | Layered view graph construction, dummy waypoint placement |
//! | `augment` | Implicit Elsewhere bundle/waypoint insertion |
//! | `selection_router` | Bundle selection -> routing rules |
//! | `partition_router` | Partition labels -> routing rules |
//! | `combined_router` | Merged routing rules -> deduped edges + decision tree |
//! | `tree` | Decision tree build/evaluate |
//! | `compile` | Top-level compiler entrypoint |
//! | `executor` | Top-level executor entrypoint |
//! | `color` | Categorical/quantitative link color specs |
//! | `dataset` | Flow table and process dimension table |
//! | `spec` | Wire-format `WeaverSpec` and its constituent types |
//! | `config` | Hierarchical configuration (weaver.toml + env) |
//! | `error` | Compile/execute error types |

pub mod augment;
pub mod color;
pub mod combined_router;
pub mod compile;
pub mod config;
pub mod constraint;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod partition;
pub mod partition_router;
pub mod query_lang;
pub mod rules;
pub mod sankey_definition;
pub mod selection_router;
pub mod spec;
pub mod tree;
pub mod view_graph;

pub use compile::{compile_sankey_definition, CompileOptions};
pub use error::{CompileError, CompileResult, ExecuteError, ExecuteResult};
pub use executor::{execute_weave, SankeyData};
pub use sankey_definition::SankeyDefinition;
pub use spec::WeaverSpec;

use dataset::{FlowTable, ProcessTable};

/// A convenience façade bundling a diagram definition with the options and
/// process table its compilation needs, so callers don't thread three
/// arguments through by hand. Grounded on the teacher's `DatalogEngine`,
/// which plays the analogous "one struct, one pipeline" role for the
/// Datalog parse/optimize/execute pipeline.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    process_table: Option<ProcessTable>,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler { process_table: None }
    }

    /// Attach a process dimension table, required when any process group
    /// in a definition uses a query-string selection (original
    /// specification §7, "Missing process-dimension table").
    pub fn with_process_table(mut self, table: ProcessTable) -> Self {
        self.process_table = Some(table);
        self
    }

    pub fn compile(
        &self,
        definition: &SankeyDefinition,
        options: CompileOptions,
    ) -> CompileResult<WeaverSpec> {
        compile_sankey_definition(definition, options, self.process_table.as_ref())
    }

    /// Compile then immediately execute against `flows`, for callers who
    /// don't need the intermediate spec.
    pub fn weave(
        &self,
        definition: &SankeyDefinition,
        options: CompileOptions,
        flows: &FlowTable,
    ) -> CompileResult<SankeyData> {
        let spec = self.compile(definition, options)?;
        Ok(execute_weave(&spec, flows))
    }
}
