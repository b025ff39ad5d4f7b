use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use crate::context::GraphContext;
use crate::error::Result;
use crate::graph::{expect_kind, Artifact, GenerateContext, Generator, Node, NodeRef, Slot};

/// Slot holding the node that produces the mesh's geometry.
pub const GENERATOR_SLOT: Slot = Slot::named("generator");

/// Uploads its generator's geometry and owns the resulting GPU handle.
struct MeshUploader {
    context: Rc<GraphContext>,
}

impl Generator for MeshUploader {
    fn generate(&mut self, cx: &mut GenerateContext<'_>) -> Result<Artifact> {
        let source = cx
            .input(&GENERATOR_SLOT)
            .cloned()
            .ok_or_else(|| cx.failure("mesh has no generator"))?;

        let (data, _) = source.get_updated_data()?;
        let geometry = data
            .geometry()
            .cloned()
            .ok_or_else(|| cx.failure(format!("input {} produced no geometry", source.id())))?;

        let handle = self
            .context
            .backend()
            .upload_mesh(&geometry)
            .map_err(|message| cx.failure(message))?;

        if self.context.detailed_log() {
            debug!(node = %cx.node_id(), %handle, vertices = geometry.vertex_count(), "uploaded mesh");
        }
        Ok(Artifact::Mesh { handle, geometry })
    }

    fn release(&mut self, artifact: &Artifact) {
        if let Artifact::Mesh { handle, .. } = artifact {
            self.context.backend().destroy(*handle);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed handle to a GPU mesh node fed by a mesh generator.
#[derive(Debug, Clone)]
pub struct Mesh {
    node: NodeRef,
}

impl Mesh {
    pub const KIND: &'static str = "Mesh";

    pub fn create(context: &Rc<GraphContext>) -> Self {
        let uploader = MeshUploader {
            context: Rc::clone(context),
        };
        Self {
            node: Node::new(Self::KIND, uploader),
        }
    }

    pub fn from_node(node: NodeRef) -> Result<Self> {
        expect_kind(&node, Self::KIND)?;
        Ok(Self { node })
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn into_node(self) -> NodeRef {
        self.node
    }

    /// Attach the geometry source, returning the one it replaces.
    pub fn set_generator(&self, generator: &NodeRef) -> Result<Option<NodeRef>> {
        self.node.set_input(GENERATOR_SLOT, generator)
    }

    pub fn generator(&self) -> Option<NodeRef> {
        self.node.input(&GENERATOR_SLOT)
    }
}
