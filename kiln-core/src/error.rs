//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. The error enum
//! separates the three failure families the graph can hit:
//!
//! - contract violations by the caller ([`InvariantViolation`]), meant to be
//!   caught during development,
//! - recoverable generation failures (a shader that does not compile, a mesh
//!   that does not fit its index format),
//! - I/O failures, carried as a typed [`IoStatus`].

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::graph::NodeId;
use crate::io::IoStatus;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Top-level error returned by graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The caller broke a graph contract.
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// A node could not produce its data. The node stays dirty and the next
    /// pull retries.
    #[error("generation of node {node} failed: {message}")]
    Generation { node: NodeId, message: String },

    /// A file could not be read or written.
    #[error("i/o failure on {}: {status}", .path.display())]
    Io { path: PathBuf, status: IoStatus },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GraphError {
    /// Whether the error is a contract violation rather than a runtime failure.
    pub fn is_invariant(&self) -> bool {
        matches!(self, GraphError::Invariant(_))
    }
}

/// Graph contracts that callers must uphold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("node {child} has no registered parent {parent}")]
    UnknownParent { child: NodeId, parent: NodeId },

    #[error("node {0} has no data generator")]
    MissingGenerator(NodeId),

    #[error("node {0} was accessed while it is generating")]
    ReentrantGeneration(NodeId),

    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("node {0} has been released")]
    Released(NodeId),

    #[error("node {node} is a {actual}, expected {expected}")]
    WrongKind {
        node: NodeId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("no factory registered for node kind `{0}`")]
    UnknownKind(String),

    #[error("shader stage {0} has no stage type")]
    UntypedStage(NodeId),

    #[error("node {0} has no source file path")]
    NoSourcePath(NodeId),

    #[error("the node manager has been shut down")]
    ShutDown,
}
