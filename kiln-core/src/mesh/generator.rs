use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use super::data::{MeshConfiguration, MeshData, MeshError};
use crate::error::Result;
use crate::events::{GraphEvent, MeshPhase};
use crate::graph::{Artifact, GenerateContext, Generator};

/// A procedural source of geometry.
pub trait MeshGenerator: 'static {
    /// How the generated geometry is drawn. The adapter stamps it on the
    /// [`MeshData`] handed to [`generate_mesh`](Self::generate_mesh).
    fn configuration(&self) -> MeshConfiguration;

    /// Fill `mesh`, which arrives empty, with this generator's geometry.
    fn generate_mesh(&mut self, mesh: &mut MeshData) -> std::result::Result<(), MeshError>;
}

/// Adapts a [`MeshGenerator`] to the node [`Generator`] capability,
/// bracketing every pass with mesh-operation events.
pub struct MeshGeneratorNode<G> {
    inner: G,
    detailed_log: bool,
}

impl<G: MeshGenerator> MeshGeneratorNode<G> {
    pub fn new(inner: G, detailed_log: bool) -> Self {
        Self {
            inner,
            detailed_log,
        }
    }

    pub fn get(&self) -> &G {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut G {
        &mut self.inner
    }
}

impl<G: MeshGenerator> Generator for MeshGeneratorNode<G> {
    fn generate(&mut self, cx: &mut GenerateContext<'_>) -> Result<Artifact> {
        cx.emit(GraphEvent::MeshOperation {
            phase: MeshPhase::Begin,
        });

        let mut mesh = MeshData::with_configuration(self.inner.configuration());
        match self.inner.generate_mesh(&mut mesh).and_then(|()| mesh.validate()) {
            Ok(()) => {
                if self.detailed_log {
                    debug!(
                        node = %cx.node_id(),
                        kind = cx.kind(),
                        vertices = mesh.vertex_count(),
                        primitives = mesh.primitive_count(),
                        "generated mesh"
                    );
                }
                cx.emit(GraphEvent::MeshOperation {
                    phase: MeshPhase::EndSuccess,
                });
                Ok(Artifact::Geometry(Rc::new(mesh)))
            }
            Err(err) => {
                cx.emit(GraphEvent::MeshOperation {
                    phase: MeshPhase::EndFailure,
                });
                Err(cx.failure(err.to_string()))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
