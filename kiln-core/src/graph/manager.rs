//! Node Manager
//!
//! Creates nodes by kind name, keeps a weak registry of everything it
//! created, and applies [`GraphCommand`]s posted from other threads.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::command::{CommandQueue, GraphCommand};
use super::node::{NodeId, NodeRef, WeakNodeRef};
use crate::context::GraphContext;
use crate::error::{GraphError, InvariantViolation, Result};
use crate::mesh::{IcosphereGenerator, Mesh};
use crate::shader::{ProgramLinkage, ShaderSource, ShaderStage};

/// Builds a fresh node of one kind.
pub type NodeFactory = Box<dyn Fn(&Rc<GraphContext>) -> NodeRef>;

/// Owner of the node factories and the command queue for one graph.
pub struct NodeManager {
    context: Rc<GraphContext>,
    factories: IndexMap<&'static str, NodeFactory>,
    registry: RefCell<IndexMap<NodeId, WeakNodeRef>>,
    commands: CommandQueue,
    shut_down: Cell<bool>,
}

impl NodeManager {
    /// A manager with the built-in node kinds registered.
    pub fn new(context: GraphContext) -> Self {
        let commands = CommandQueue::new(context.config().command_queue_capacity);
        let mut manager = Self {
            context: Rc::new(context),
            factories: IndexMap::new(),
            registry: RefCell::new(IndexMap::new()),
            commands,
            shut_down: Cell::new(false),
        };
        manager.register_builtin_kinds();
        manager
    }

    fn register_builtin_kinds(&mut self) {
        self.register_kind(
            ShaderSource::KIND,
            Box::new(|cx: &Rc<GraphContext>| ShaderSource::create(cx).into_node()),
        );
        self.register_kind(
            ShaderStage::KIND,
            Box::new(|cx: &Rc<GraphContext>| ShaderStage::create(cx).into_node()),
        );
        self.register_kind(
            ProgramLinkage::KIND,
            Box::new(|cx: &Rc<GraphContext>| ProgramLinkage::create(cx).into_node()),
        );
        self.register_kind(
            IcosphereGenerator::KIND,
            Box::new(|cx: &Rc<GraphContext>| IcosphereGenerator::create(cx).into_node()),
        );
        self.register_kind(
            Mesh::KIND,
            Box::new(|cx: &Rc<GraphContext>| Mesh::create(cx).into_node()),
        );
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register_kind(&mut self, kind: &'static str, factory: NodeFactory) -> Option<NodeFactory> {
        self.factories.insert(kind, factory)
    }

    /// Registered kinds, in registration order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn context(&self) -> &Rc<GraphContext> {
        &self.context
    }

    /// A handle other threads can post commands to.
    pub fn command_queue(&self) -> CommandQueue {
        self.commands.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.get()
    }

    // ------------------------------------------------------------------
    // Creation and lookup
    // ------------------------------------------------------------------

    pub fn create_node(&self, kind: &str) -> Result<NodeRef> {
        if self.shut_down.get() {
            return Err(InvariantViolation::ShutDown.into());
        }
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| InvariantViolation::UnknownKind(kind.to_owned()))?;
        let node = factory(&self.context);
        self.track(&node);
        debug!(node = %node.id(), kind = node.kind(), "created node");
        Ok(node)
    }

    pub fn create_shader_source(&self) -> Result<ShaderSource> {
        ShaderSource::from_node(self.create_node(ShaderSource::KIND)?, &self.context)
    }

    pub fn create_shader_stage(&self) -> Result<ShaderStage> {
        ShaderStage::from_node(self.create_node(ShaderStage::KIND)?, &self.context)
    }

    pub fn create_program(&self) -> Result<ProgramLinkage> {
        ProgramLinkage::from_node(self.create_node(ProgramLinkage::KIND)?)
    }

    pub fn create_icosphere(&self) -> Result<IcosphereGenerator> {
        IcosphereGenerator::from_node(self.create_node(IcosphereGenerator::KIND)?)
    }

    pub fn create_mesh(&self) -> Result<Mesh> {
        Mesh::from_node(self.create_node(Mesh::KIND)?)
    }

    /// Add a node built outside the manager to the registry, so commands
    /// can reach it and shutdown tears it down.
    pub fn track(&self, node: &NodeRef) {
        let mut registry = self.registry.borrow_mut();
        registry.retain(|_, weak| weak.strong_count() > 0);
        registry.insert(node.id(), Rc::downgrade(node));
    }

    /// The live node with this id, if any.
    pub fn node(&self, id: NodeId) -> Option<NodeRef> {
        self.registry
            .borrow()
            .get(&id)
            .and_then(WeakNodeRef::upgrade)
            .filter(|node| node.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.registry
            .borrow()
            .values()
            .filter_map(WeakNodeRef::upgrade)
            .filter(|node| node.is_live())
            .count()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Apply every pending command. Failing commands are logged and returned;
    /// the rest still run.
    pub fn drain_commands(&self) -> Vec<(GraphCommand, GraphError)> {
        let commands = self.commands.drain();
        if commands.is_empty() {
            return Vec::new();
        }
        debug!(count = commands.len(), "draining command queue");

        let mut failures = Vec::new();
        for command in commands {
            if let Err(err) = self.apply(&command) {
                warn!(?command, error = %err, "command failed");
                failures.push((command, err));
            }
        }
        failures
    }

    /// Apply one command. Commands addressed to nodes that no longer exist
    /// are dropped.
    pub fn apply(&self, command: &GraphCommand) -> Result<()> {
        let Some(node) = self.node(command.target()) else {
            warn!(?command, "command target is gone");
            return Ok(());
        };

        match command {
            GraphCommand::SetSource { source, .. } => match node.kind() {
                ShaderStage::KIND => ShaderStage::from_node(node, &self.context)?.set_source(source),
                ShaderSource::KIND => {
                    ShaderSource::from_node(node, &self.context)?.set_source(source)
                }
                actual => Err(InvariantViolation::WrongKind {
                    node: node.id(),
                    expected: "ShaderStage or ShaderSource",
                    actual,
                }
                .into()),
            },
            GraphCommand::SetDegree { degree, .. } => {
                IcosphereGenerator::from_node(node)?.set_degree(*degree)
            }
            GraphCommand::SetRadius { radius, .. } => {
                IcosphereGenerator::from_node(node)?.set_radius(*radius)
            }
            GraphCommand::Invalidate(_) => {
                node.invalidate();
                Ok(())
            }
            GraphCommand::Compile(_) => ShaderStage::from_node(node, &self.context)?
                .compile()
                .map(|_| ()),
            GraphCommand::ReleaseData(_) => {
                node.release_data_and_propagate();
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Apply pending commands, then tear down every registered node.
    /// Idempotent. Handles held elsewhere stay valid but their nodes are
    /// released.
    pub fn shutdown(&self) {
        if self.shut_down.replace(true) {
            return;
        }
        for (command, err) in self.drain_commands() {
            warn!(?command, error = %err, "command failed during shutdown");
        }

        let nodes: Vec<NodeRef> = std::mem::take(&mut *self.registry.borrow_mut())
            .into_values()
            .filter_map(|weak| weak.upgrade())
            .collect();
        debug!(nodes = nodes.len(), "shutting down graph");
        for node in &nodes {
            node.destroy();
        }
    }
}

impl Drop for NodeManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeManager")
            .field("kinds", &self.kinds())
            .field("live", &self.live_count())
            .field("pending_commands", &self.commands.len())
            .field("shut_down", &self.shut_down.get())
            .finish()
    }
}
