//! Crate error types.
//!
//! Compile-time errors (raised wherever a declaration is ambiguous) are
//! distinct from execution-time errors (execution never fails on missing
//! data — see SPEC_FULL.md s10.2 and the original specification s7).

use thiserror::Error;

/// Errors raised while compiling a diagram definition into a [`crate::spec::WeaverSpec`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Bundle, waypoint, or ordering entry names an undefined node.
    #[error("unknown node \"{0}\"")]
    UnknownNode(String),

    /// A bundle endpoint names a waypoint, or a waypoint list contains a
    /// process group.
    #[error("wrong node kind for \"{0}\": {1}")]
    WrongNodeKind(String, &'static str),

    /// Two concrete bundles claim the same (source, target, flow-selection)
    /// region.
    #[error("overlapping explicit bundles: {0} and {1}")]
    OverlappingBundles(String, String),

    /// More than one group in a partition matches the same region.
    #[error("partition groups overlap on value \"{0}\"")]
    OverlappingPartitionGroups(String),

    /// The same value was assigned to two groups of a `Partition::simple`.
    #[error("duplicate value \"{0}\" in partition")]
    DuplicatePartitionValue(String),

    /// A process group uses a query-string selection but no process
    /// dimension table was supplied.
    #[error("cannot compile query-string selection \"{0}\" without a process dimension table")]
    MissingProcessDimensionTable(String),

    /// The query-string predicate sublanguage failed to parse.
    #[error("invalid query string \"{0}\": {1}")]
    InvalidQueryString(String, String),

    /// A bundle's flow_selection attribute was already constrained by the
    /// endpoint selection.
    #[error("attribute \"{0}\" already constrained in bundle selection")]
    AttributeAlreadyConstrained(String),

    /// The requested link-color attribute has no valid color spec.
    #[error("invalid color specification: {0}")]
    InvalidColorSpec(String),

    /// Both endpoints of a bundle are Elsewhere.
    #[error("bundle cannot go from Elsewhere to Elsewhere")]
    ElsewhereToElsewhere,

    /// More than one bundle declares itself the to/from-elsewhere bundle
    /// for the same process group.
    #[error("duplicate elsewhere bundle for \"{0}\"")]
    DuplicateElsewhereBundle(String),
}

/// Errors raised while loading a previously-compiled spec. Execution
/// against a flow table never fails (missing columns yield zero/absent
/// measures, not errors); this type exists only for I/O and deserialization.
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("failed to parse spec JSON: {0}")]
    InvalidSpec(#[from] serde_json::Error),
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type ExecuteResult<T> = Result<T, ExecuteError>;
