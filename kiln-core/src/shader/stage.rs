use std::any::Any;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use super::program::ProgramLinkage;
use super::source::{load_text, save_text, ShaderSource, SourceText};
use super::StageKind;
use crate::backend::CompileDiagnostic;
use crate::context::GraphContext;
use crate::error::{GraphError, InvariantViolation, Result};
use crate::events::GraphEvent;
use crate::graph::{expect_kind, Artifact, GenerateContext, Generator, Node, NodeRef, Slot};

/// Name of the numbered slots holding a stage's includes.
pub const INCLUDE_SLOT: &str = "include";

pub(crate) struct StageCompiler {
    context: Rc<GraphContext>,
    stage: Option<StageKind>,
    source: SourceText,
}

impl StageCompiler {
    pub(crate) fn stage(&self) -> Option<StageKind> {
        self.stage
    }

    /// Include texts in slot order, each terminated by a newline.
    fn assemble_includes(cx: &GenerateContext<'_>) -> Result<String> {
        let mut includes: Vec<(u32, NodeRef)> = cx
            .inputs()
            .filter(|(slot, _)| slot.name() == INCLUDE_SLOT)
            .map(|(slot, node)| (slot.index(), Rc::clone(node)))
            .collect();
        includes.sort_by_key(|(index, _)| *index);

        let mut text = String::new();
        for (_, include) in includes {
            let (data, _) = include.get_updated_data()?;
            if let Some(source) = data.source() {
                text.push_str(source);
                if !source.ends_with('\n') {
                    text.push('\n');
                }
            }
        }
        Ok(text)
    }
}

impl Generator for StageCompiler {
    fn generate(&mut self, cx: &mut GenerateContext<'_>) -> Result<Artifact> {
        let stage = self
            .stage
            .ok_or(InvariantViolation::UntypedStage(cx.node_id()))?;

        let mut text = Self::assemble_includes(cx)?;
        let prefix_lines = text.lines().count() as u32;
        text.push_str(self.source.text());

        cx.emit(GraphEvent::CompilationBegin);
        match self.context.backend().compile_stage(stage, &text) {
            Ok(handle) => {
                if self.context.detailed_log() {
                    debug!(node = %cx.node_id(), %stage, %handle, "compiled shader stage");
                }
                cx.emit(GraphEvent::CompilationEnd { success: true });
                Ok(Artifact::Shader { stage, handle })
            }
            Err(mut diagnostics) => {
                if diagnostics.is_empty() {
                    diagnostics.push(CompileDiagnostic::new(0, "compilation failed", ""));
                }
                // Lines are reported relative to the stage's own text; lines
                // inside included text map to 0.
                for diagnostic in &diagnostics {
                    cx.emit(GraphEvent::CompilationError {
                        line: diagnostic.line.saturating_sub(prefix_lines),
                        message: diagnostic.message.clone(),
                        token: diagnostic.token.clone(),
                    });
                }
                cx.emit(GraphEvent::CompilationEnd { success: false });
                Err(cx.failure(format!(
                    "{stage} stage failed to compile with {} error(s)",
                    diagnostics.len()
                )))
            }
        }
    }

    fn release(&mut self, artifact: &Artifact) {
        if let Artifact::Shader { handle, .. } = artifact {
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

/// Stage type of a shader stage node.
pub(crate) fn stage_kind_of(node: &Node) -> Result<Option<StageKind>> {
    expect_kind(node, ShaderStage::KIND)?;
    node.with_generator(|g: &StageCompiler| g.stage())
}

/// Typed handle to a shader stage node.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    node: NodeRef,
    context: Rc<GraphContext>,
}

impl ShaderStage {
    pub const KIND: &'static str = "ShaderStage";

    /// A stage with no type yet. It cannot compile until
    /// [`set_stage`](Self::set_stage) or [`open_file`](Self::open_file) gives
    /// it one.
    pub fn create(context: &Rc<GraphContext>) -> Self {
        let compiler = StageCompiler {
            context: Rc::clone(context),
            stage: None,
            source: SourceText::new(),
        };
        Self {
            node: Node::new(Self::KIND, compiler),
            context: Rc::clone(context),
        }
    }

    pub fn create_typed(context: &Rc<GraphContext>, stage: StageKind, source: &str) -> Result<Self> {
        let this = Self::create(context);
        this.node.with_generator_mut(|g: &mut StageCompiler| {
            g.stage = Some(stage);
            g.source.set_text(source);
        })?;
        Ok(this)
    }

    pub fn from_node(node: NodeRef, context: &Rc<GraphContext>) -> Result<Self> {
        expect_kind(&node, Self::KIND)?;
        Ok(Self {
            node,
            context: Rc::clone(context),
        })
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn into_node(self) -> NodeRef {
        self.node
    }

    pub fn stage(&self) -> Result<Option<StageKind>> {
        stage_kind_of(&self.node)
    }

    /// Give the stage a type. Programs already linking the stage move it to
    /// the slot of the new type.
    pub fn set_stage(&self, stage: StageKind) -> Result<()> {
        let previous = self
            .node
            .with_generator_mut(|g: &mut StageCompiler| g.stage.replace(stage))?;
        if previous != Some(stage) {
            self.reslot_in_programs(stage)?;
            self.node.invalidate();
        }
        Ok(())
    }

    fn reslot_in_programs(&self, stage: StageKind) -> Result<()> {
        for program in self.programs() {
            ProgramLinkage::from_node(program)?.reslot_shader_stage(&self.node, stage)?;
        }
        Ok(())
    }

    pub fn source(&self) -> Result<Rc<str>> {
        self.node
            .with_generator(|g: &StageCompiler| Rc::clone(g.source.text()))
    }

    pub fn path(&self) -> Result<Option<PathBuf>> {
        self.node
            .with_generator(|g: &StageCompiler| g.source.path().map(Path::to_path_buf))
    }

    /// Replace the stage's own text, invalidating it and its programs when
    /// the text changes.
    pub fn set_source(&self, text: &str) -> Result<()> {
        let changed = self
            .node
            .with_generator_mut(|g: &mut StageCompiler| g.source.set_text(text))?;
        if changed {
            self.node.invalidate();
        }
        Ok(())
    }

    /// Load the stage's text from a file. The stage type is taken from the
    /// file extension when it names one.
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = load_text(&self.node, &self.context, path)?;
        let inferred = StageKind::from_path(path);
        if inferred.is_none() {
            warn!(node = %self.node.id(), path = %path.display(), "unknown shader extension");
        }

        let (text_changed, retyped) = self.node.with_generator_mut(|g: &mut StageCompiler| {
            g.source.set_path(path.to_path_buf());
            let text_changed = g.source.set_text(&text);
            let mut retyped = None;
            if let Some(stage) = inferred {
                if g.stage.replace(stage) != Some(stage) {
                    retyped = Some(stage);
                }
            }
            (text_changed, retyped)
        })?;
        if let Some(stage) = retyped {
            self.reslot_in_programs(stage)?;
        }
        if text_changed || retyped.is_some() {
            self.node.invalidate();
        }
        Ok(())
    }

    pub fn save_file(&self) -> Result<()> {
        let (path, text) = self.node.with_generator(|g: &StageCompiler| {
            (g.source.path().map(Path::to_path_buf), Rc::clone(g.source.text()))
        })?;
        let path = path.ok_or(InvariantViolation::NoSourcePath(self.node.id()))?;
        save_text(&self.node, &self.context, &path, &text)
    }

    /// Prepend `include`'s text to this stage. Returns the slot used; includes
    /// are concatenated in the order they were added.
    pub fn add_include(&self, include: &ShaderSource) -> Result<Slot> {
        let next = self
            .node
            .inputs()
            .iter()
            .filter(|(slot, _)| slot.name() == INCLUDE_SLOT)
            .map(|(slot, _)| slot.index() + 1)
            .max()
            .unwrap_or(0);
        let slot = Slot::indexed(INCLUDE_SLOT, next);
        self.node.set_input(slot.clone(), include.node())?;
        Ok(slot)
    }

    /// Detach every include slot pointing at `include`. Returns whether any
    /// was attached.
    pub fn remove_include(&self, include: &ShaderSource) -> Result<bool> {
        let slots: Vec<Slot> = self
            .node
            .inputs()
            .into_iter()
            .filter(|(slot, node)| slot.name() == INCLUDE_SLOT && node.id() == include.node().id())
            .map(|(slot, _)| slot)
            .collect();
        for slot in &slots {
            self.node.remove_input(slot)?;
        }
        Ok(!slots.is_empty())
    }

    pub fn includes(&self) -> Vec<NodeRef> {
        let mut includes: Vec<(u32, NodeRef)> = self
            .node
            .inputs()
            .into_iter()
            .filter(|(slot, _)| slot.name() == INCLUDE_SLOT)
            .map(|(slot, node)| (slot.index(), node))
            .collect();
        includes.sort_by_key(|(index, _)| *index);
        includes.into_iter().map(|(_, node)| node).collect()
    }

    /// Programs linking this stage, each listed once.
    pub fn programs(&self) -> Vec<NodeRef> {
        let mut programs: Vec<NodeRef> = Vec::new();
        for parent in self.node.parents() {
            if parent.kind() == ProgramLinkage::KIND
                && !programs.iter().any(|known| known.id() == parent.id())
            {
                programs.push(parent);
            }
        }
        programs
    }

    /// Compile now instead of waiting for a program to pull.
    ///
    /// When the stage regenerates, every program linking it is relinked
    /// immediately. All programs are attempted; the first link failure is
    /// returned. Returns whether the stage regenerated.
    pub fn compile(&self) -> Result<bool> {
        let (_, updated) = self.node.get_updated_data()?;
        if !updated {
            return Ok(false);
        }

        let mut first_error: Option<GraphError> = None;
        for program in self.programs() {
            program.invalidate();
            if let Err(err) = program.get_updated_data() {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }
}
