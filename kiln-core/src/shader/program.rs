use std::any::Any;
use std::rc::Rc;

use tracing::{debug, warn};

use super::stage::{stage_kind_of, ShaderStage};
use super::StageKind;
use crate::context::GraphContext;
use crate::error::{InvariantViolation, Result};
use crate::events::GraphEvent;
use crate::graph::{expect_kind, Artifact, GenerateContext, Generator, Node, NodeRef, Slot};

struct ProgramLinker {
    context: Rc<GraphContext>,
}

impl ProgramLinker {
    fn fail(cx: &GenerateContext<'_>, message: String) -> crate::error::GraphError {
        cx.emit(GraphEvent::CompilationError {
            line: 0,
            message: message.clone(),
            token: String::new(),
        });
        cx.emit(GraphEvent::CompilationEnd { success: false });
        cx.failure(message)
    }
}

impl Generator for ProgramLinker {
    fn generate(&mut self, cx: &mut GenerateContext<'_>) -> Result<Artifact> {
        let cx: &GenerateContext<'_> = cx;
        let stages: Vec<NodeRef> = cx
            .inputs()
            .filter(|(_, node)| node.kind() == ShaderStage::KIND)
            .map(|(_, node)| Rc::clone(node))
            .collect();

        cx.emit(GraphEvent::CompilationBegin);

        let mut handles: Vec<(StageKind, _)> = Vec::with_capacity(stages.len());
        for stage in &stages {
            let (data, _) = stage
                .get_updated_data()
                .map_err(|err| Self::fail(cx, format!("stage {} is unusable: {err}", stage.id())))?;
            match data.artifact() {
                Artifact::Shader { stage, handle } => handles.push((*stage, *handle)),
                _ => {
                    return Err(Self::fail(
                        cx,
                        format!("stage {} produced no shader", stage.id()),
                    ))
                }
            }
        }

        match self.context.backend().link_program(&handles) {
            Ok(handle) => {
                if self.context.detailed_log() {
                    debug!(node = %cx.node_id(), %handle, stages = handles.len(), "linked program");
                }
                cx.emit(GraphEvent::CompilationEnd { success: true });
                Ok(Artifact::Program(handle))
            }
            Err(diagnostics) => {
                for diagnostic in &diagnostics {
                    cx.emit(GraphEvent::CompilationError {
                        line: diagnostic.line,
                        message: diagnostic.message.clone(),
                        token: diagnostic.token.clone(),
                    });
                }
                cx.emit(GraphEvent::CompilationEnd { success: false });
                Err(cx.failure(format!(
                    "program failed to link with {} error(s)",
                    diagnostics.len().max(1)
                )))
            }
        }
    }

    fn release(&mut self, artifact: &Artifact) {
        if let Artifact::Program(handle) = artifact {
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

/// Typed handle to a program node, linked from at most one stage per
/// [`StageKind`].
#[derive(Debug, Clone)]
pub struct ProgramLinkage {
    node: NodeRef,
}

impl ProgramLinkage {
    pub const KIND: &'static str = "ProgramLinkage";

    pub fn create(context: &Rc<GraphContext>) -> Self {
        let linker = ProgramLinker {
            context: Rc::clone(context),
        };
        Self {
            node: Node::new(Self::KIND, linker),
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

    /// Attach `stage` in the slot of its stage kind, returning the stage it
    /// replaces. The stage must already have a type.
    pub fn set_shader_stage(&self, stage: &ShaderStage) -> Result<Option<NodeRef>> {
        let kind = stage_kind_of(stage.node())?
            .ok_or(InvariantViolation::UntypedStage(stage.node().id()))?;
        self.node.set_input(kind.slot(), stage.node())
    }

    /// Move `stage` into the slot of `kind` after its stage type changed,
    /// returning the stage it displaced from that slot.
    pub(crate) fn reslot_shader_stage(
        &self,
        stage: &NodeRef,
        kind: StageKind,
    ) -> Result<Option<NodeRef>> {
        let target = kind.slot();
        let stale: Vec<Slot> = self
            .node
            .inputs()
            .into_iter()
            .filter(|(slot, node)| *slot != target && node.id() == stage.id())
            .map(|(slot, _)| slot)
            .collect();
        if stale.is_empty() {
            return Ok(None);
        }
        for slot in &stale {
            self.node.remove_input(slot)?;
        }

        let displaced = self.node.set_input(target, stage)?;
        if let Some(displaced) = &displaced {
            warn!(
                program = %self.node.id(),
                stage = %stage.id(),
                displaced = %displaced.id(),
                %kind,
                "stage type change displaced another stage"
            );
        }
        Ok(displaced)
    }

    pub fn find_shader_stage(&self, kind: StageKind) -> Option<NodeRef> {
        self.node.input(&kind.slot())
    }

    pub fn remove_shader_stage(&self, kind: StageKind) -> Result<Option<NodeRef>> {
        self.node.remove_input(&kind.slot())
    }

    /// Attached stages with their kinds, in attachment order.
    pub fn stages(&self) -> Vec<(StageKind, NodeRef)> {
        self.node
            .inputs()
            .into_iter()
            .filter_map(|(slot, node)| {
                StageKind::ALL
                    .into_iter()
                    .find(|kind| kind.slot() == slot)
                    .map(|kind| (kind, node))
            })
            .collect()
    }
}
