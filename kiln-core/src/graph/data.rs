//! Node Data
//!
//! The payload a node generates. Each [`NodeData`] belongs to exactly one
//! node; consumers receive it behind an `Rc` so repeated clean pulls hand
//! out the identical allocation.

use std::cell::Cell;
use std::rc::Rc;

use crate::backend::GpuHandle;
use crate::mesh::MeshData;
use crate::shader::StageKind;

/// A derived artifact produced by a node's generator.
#[derive(Debug, Clone)]
pub enum Artifact {
    /// Nothing beyond the fact that generation ran.
    Empty,

    /// Shader text, used by include fragments.
    Source(Rc<str>),

    /// A compiled shader stage.
    Shader { stage: StageKind, handle: GpuHandle },

    /// A linked GPU program.
    Program(GpuHandle),

    /// CPU-side generated geometry.
    Geometry(Rc<MeshData>),

    /// Geometry uploaded to the GPU.
    Mesh {
        handle: GpuHandle,
        geometry: Rc<MeshData>,
    },
}

/// Generated data plus a validity flag, distinguishing "present but stale"
/// from "absent" (which is `None` on the owning node).
#[derive(Debug)]
pub struct NodeData {
    artifact: Artifact,
    valid: Cell<bool>,
    version: u64,
}

impl NodeData {
    pub(crate) fn new(artifact: Artifact, version: u64) -> Self {
        Self {
            artifact,
            valid: Cell::new(true),
            version,
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    pub(crate) fn invalidate(&self) {
        self.valid.set(false);
    }

    /// Generation counter of the owning node at the time this data was made.
    /// Starts at 1 and increases by one per successful regeneration.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The GPU handle, for compiled, linked and uploaded artifacts.
    pub fn gpu_handle(&self) -> Option<GpuHandle> {
        match &self.artifact {
            Artifact::Shader { handle, .. } | Artifact::Program(handle) => Some(*handle),
            Artifact::Mesh { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match &self.artifact {
            Artifact::Source(text) => Some(text),
            _ => None,
        }
    }

    pub fn geometry(&self) -> Option<&Rc<MeshData>> {
        match &self.artifact {
            Artifact::Geometry(geometry) | Artifact::Mesh { geometry, .. } => Some(geometry),
            _ => None,
        }
    }
}
