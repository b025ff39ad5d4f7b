//! Cross-thread Commands
//!
//! The graph itself is `!Send`. A host UI or tool thread that wants to edit
//! it posts [`GraphCommand`]s to a [`CommandQueue`]; the thread owning the
//! graph drains the queue once per loop iteration.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::node::NodeId;

/// An edit addressed to a node by id.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphCommand {
    /// Replace the text of a shader stage or shader source.
    SetSource { node: NodeId, source: String },

    SetDegree { node: NodeId, degree: u32 },

    SetRadius { node: NodeId, radius: f32 },

    /// Invalidate the node and its consumers.
    Invalidate(NodeId),

    /// Compile a shader stage now and relink its programs.
    Compile(NodeId),

    /// Drop the node's data and that of its inputs.
    ReleaseData(NodeId),
}

impl GraphCommand {
    pub fn target(&self) -> NodeId {
        match self {
            GraphCommand::SetSource { node, .. }
            | GraphCommand::SetDegree { node, .. }
            | GraphCommand::SetRadius { node, .. } => *node,
            GraphCommand::Invalidate(node)
            | GraphCommand::Compile(node)
            | GraphCommand::ReleaseData(node) => *node,
        }
    }
}

/// Multi-producer queue of [`GraphCommand`]s. Clones share the queue.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<GraphCommand>>>,
    soft_capacity: usize,
}

impl CommandQueue {
    /// `soft_capacity` only triggers a warning; pushes never block or fail.
    pub fn new(soft_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            soft_capacity,
        }
    }

    pub fn push(&self, command: GraphCommand) {
        let mut queue = self.inner.lock();
        queue.push_back(command);
        if queue.len() > self.soft_capacity {
            warn!(
                pending = queue.len(),
                capacity = self.soft_capacity,
                "command queue over capacity"
            );
        }
    }

    /// Take every pending command, oldest first.
    pub fn drain(&self) -> Vec<GraphCommand> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
