//! Services shared by every node created from one manager.

use std::fmt;
use std::rc::Rc;

use crate::backend::{GpuBackend, HeadlessBackend};
use crate::config::GraphConfig;
use crate::io::{FsIoManager, IoManager};

/// The collaborators a node reaches outside the graph: the GPU, the file
/// system and the runtime configuration.
///
/// Nodes hold an `Rc<GraphContext>`; nothing in the crate reads global state.
pub struct GraphContext {
    backend: Rc<dyn GpuBackend>,
    io: Rc<dyn IoManager>,
    config: GraphConfig,
}

impl GraphContext {
    pub fn new(backend: Rc<dyn GpuBackend>, io: Rc<dyn IoManager>) -> Self {
        Self::with_config(backend, io, GraphConfig::default())
    }

    pub fn with_config(
        backend: Rc<dyn GpuBackend>,
        io: Rc<dyn IoManager>,
        config: GraphConfig,
    ) -> Self {
        Self {
            backend,
            io,
            config,
        }
    }

    /// A [`HeadlessBackend`] plus filesystem access relative to the current
    /// directory.
    pub fn headless() -> Self {
        Self::new(Rc::new(HeadlessBackend::new()), Rc::new(FsIoManager::new(".")))
    }

    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    pub fn io(&self) -> &dyn IoManager {
        self.io.as_ref()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn detailed_log(&self) -> bool {
        self.config.detailed_log
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
