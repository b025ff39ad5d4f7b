//! Diagnostics Channel
//!
//! Nodes report compilation and file-operation outcomes through typed
//! [`GraphEvent`]s. Each node has at most one [`DiagnosticsListener`],
//! attached by whoever owns the node (typically an editor panel). The node
//! never knows the listener's concrete type.
//!
//! Dispatch is synchronous: the listener has seen an event by the time the
//! node's operation continues. For one compilation, `CompilationBegin` always
//! comes first, any number of `CompilationError`s follow, and a single
//! `CompilationEnd` closes it.

mod dispatcher;
mod listener;

pub use dispatcher::EventDispatcher;
pub use listener::{DiagnosticsListener, RecordingListener};

use serde::Serialize;

use crate::io::IoStatus;

/// What a file-operation event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    LoadError,
    SaveSuccess,
    SaveError,
}

/// Progress of a mesh generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshPhase {
    Begin,
    EndSuccess,
    EndFailure,
}

/// A diagnostics event emitted by a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    CompilationBegin,

    CompilationError {
        line: u32,
        message: String,
        token: String,
    },

    CompilationEnd {
        success: bool,
    },

    FileOperation {
        kind: FileOperation,
        status: IoStatus,
        path: String,
        message: String,
    },

    SourceLoaded {
        path: String,
        len: usize,
    },

    MeshOperation {
        phase: MeshPhase,
    },
}

impl GraphEvent {
    pub fn is_error(&self) -> bool {
        match self {
            GraphEvent::CompilationError { .. } => true,
            GraphEvent::CompilationEnd { success } => !success,
            GraphEvent::FileOperation { kind, .. } => *kind != FileOperation::SaveSuccess,
            GraphEvent::MeshOperation { phase } => *phase == MeshPhase::EndFailure,
            GraphEvent::CompilationBegin | GraphEvent::SourceLoaded { .. } => false,
        }
    }
}
